//! Settings page routing and license gating

/// Settings tabs, each with one canonical path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsTab {
    Proxmox,
    Agents,
    AgentProfiles,
    Docker,
    Kubernetes,
    Alerts,
    General,
    Network,
    Updates,
    Backups,
    Diagnostics,
    Ai,
    Relay,
    Reporting,
    Security,
    Api,
    Roles,
    Audit,
    Organization,
    Billing,
}

impl SettingsTab {
    pub const ALL: [SettingsTab; 20] = [
        Self::Proxmox,
        Self::Agents,
        Self::AgentProfiles,
        Self::Docker,
        Self::Kubernetes,
        Self::Alerts,
        Self::General,
        Self::Network,
        Self::Updates,
        Self::Backups,
        Self::Diagnostics,
        Self::Ai,
        Self::Relay,
        Self::Reporting,
        Self::Security,
        Self::Api,
        Self::Roles,
        Self::Audit,
        Self::Organization,
        Self::Billing,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Proxmox => "proxmox",
            Self::Agents => "agents",
            Self::AgentProfiles => "agent-profiles",
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::Alerts => "alerts",
            Self::General => "general",
            Self::Network => "network",
            Self::Updates => "updates",
            Self::Backups => "backups",
            Self::Diagnostics => "diagnostics",
            Self::Ai => "ai",
            Self::Relay => "relay",
            Self::Reporting => "reporting",
            Self::Security => "security",
            Self::Api => "api",
            Self::Roles => "roles",
            Self::Audit => "audit",
            Self::Organization => "organization",
            Self::Billing => "billing",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

pub fn tab_path(tab: SettingsTab) -> &'static str {
    match tab {
        SettingsTab::Proxmox => "/settings/infrastructure",
        SettingsTab::Agents => "/settings/infrastructure/agents",
        SettingsTab::AgentProfiles => "/settings/infrastructure/agents/profiles",
        SettingsTab::Docker => "/settings/workloads/docker",
        SettingsTab::Kubernetes => "/settings/workloads/kubernetes",
        SettingsTab::Alerts => "/settings/alerts",
        SettingsTab::General => "/settings/system/general",
        SettingsTab::Network => "/settings/system/network",
        SettingsTab::Updates => "/settings/system/updates",
        SettingsTab::Backups => "/settings/system/backups",
        SettingsTab::Diagnostics => "/settings/system/diagnostics",
        SettingsTab::Ai => "/settings/system/ai",
        SettingsTab::Relay => "/settings/system/relay",
        SettingsTab::Reporting => "/settings/system/reporting",
        SettingsTab::Security => "/settings/security",
        SettingsTab::Api => "/settings/security/api",
        SettingsTab::Roles => "/settings/security/roles",
        SettingsTab::Audit => "/settings/security/audit",
        SettingsTab::Organization => "/settings/organization",
        SettingsTab::Billing => "/settings/organization/billing",
    }
}

// Old flat settings URLs and where they live now
const LEGACY_REDIRECTS: &[(&str, &str)] = &[
    ("/settings/pve", "/settings/infrastructure/pve"),
    ("/settings/pbs", "/settings/infrastructure/pbs"),
    ("/settings/pmg", "/settings/infrastructure/pmg"),
    ("/settings/proxmox", "/settings/infrastructure"),
    ("/settings/hosts", "/settings/infrastructure/agents"),
    ("/settings/host-agents", "/settings/infrastructure/agents"),
    ("/settings/agents", "/settings/infrastructure/agents"),
    ("/settings/docker", "/settings/workloads/docker"),
    ("/settings/kubernetes", "/settings/workloads/kubernetes"),
    ("/settings/system", "/settings/system/general"),
    ("/settings/network", "/settings/system/network"),
    ("/settings/updates", "/settings/system/updates"),
    ("/settings/backups", "/settings/system/backups"),
    ("/settings/diagnostics", "/settings/system/diagnostics"),
    ("/settings/api", "/settings/security/api"),
    ("/settings/billing", "/settings/organization/billing"),
];

/// Strip query, fragment and trailing slashes
fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// New location for a legacy settings URL, if it is one
pub fn legacy_redirect(path: &str) -> Option<&'static str> {
    let path = normalize_path(path);
    LEGACY_REDIRECTS.iter().find(|(old, _)| *old == path).map(|(_, new)| *new)
}

/// Exact canonical path, then legacy alias, then the longest canonical
/// prefix; anything else lands on the Proxmox tab
pub fn derive_tab_from_path(path: &str) -> SettingsTab {
    let path = normalize_path(path);
    if let Some(tab) = SettingsTab::ALL.into_iter().find(|t| tab_path(*t) == path) {
        return tab;
    }
    let path = legacy_redirect(path).unwrap_or(path);
    SettingsTab::ALL
        .into_iter()
        .filter(|t| has_prefix(path, tab_path(*t)))
        .max_by_key(|t| tab_path(*t).len())
        .unwrap_or(SettingsTab::Proxmox)
}

// ─── License gating ───

/// License features a tab needs; empty means always available
pub fn required_features(tab: SettingsTab) -> &'static [&'static str] {
    match tab {
        SettingsTab::AgentProfiles => &["agent_profiles"],
        SettingsTab::Ai => &["ai_alerts"],
        SettingsTab::Relay => &["relay"],
        SettingsTab::Reporting => &["long_term_metrics"],
        SettingsTab::Roles => &["rbac"],
        SettingsTab::Audit => &["rbac", "audit_logging"],
        SettingsTab::Organization => &["multi_tenant"],
        _ => &[],
    }
}

/// Locked only once the license is known and a required feature is missing
pub fn is_tab_locked(tab: SettingsTab, has_feature: impl Fn(&str) -> bool, license_loaded: bool) -> bool {
    if !license_loaded {
        return false;
    }
    required_features(tab).iter().copied().any(|f| !has_feature(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tab_round_trips() {
        for tab in SettingsTab::ALL {
            assert_eq!(derive_tab_from_path(tab_path(tab)), tab, "{}", tab.id());
            assert_eq!(SettingsTab::from_id(tab.id()), Some(tab));
        }
    }

    #[test]
    fn test_legacy_paths() {
        let cases = [
            ("/settings/pve", SettingsTab::Proxmox),
            ("/settings/pbs", SettingsTab::Proxmox),
            ("/settings/pmg", SettingsTab::Proxmox),
            ("/settings/hosts", SettingsTab::Agents),
            ("/settings/host-agents", SettingsTab::Agents),
            ("/settings/docker", SettingsTab::Docker),
            ("/settings/billing", SettingsTab::Billing),
            ("/settings/api", SettingsTab::Api),
            ("/settings/system", SettingsTab::General),
        ];
        for (path, tab) in cases {
            assert_eq!(derive_tab_from_path(path), tab, "{}", path);
        }
        assert_eq!(legacy_redirect("/settings/pve/"), Some("/settings/infrastructure/pve"));
        assert_eq!(legacy_redirect("/settings/billing?x=1"), Some("/settings/organization/billing"));
        assert_eq!(legacy_redirect("/settings/infrastructure"), None);
    }

    #[test]
    fn test_prefix_and_fallback() {
        assert_eq!(derive_tab_from_path("/settings/infrastructure/pve"), SettingsTab::Proxmox);
        assert_eq!(derive_tab_from_path("/settings/infrastructure/agents/abc"), SettingsTab::Agents);
        assert_eq!(derive_tab_from_path("/settings/infrastructure/agents-old"), SettingsTab::Proxmox);
        assert_eq!(derive_tab_from_path("/settings/security/api/tokens"), SettingsTab::Api);
        assert_eq!(derive_tab_from_path("/settings"), SettingsTab::Proxmox);
        assert_eq!(derive_tab_from_path("/somewhere/else"), SettingsTab::Proxmox);
    }

    #[test]
    fn test_tab_locking() {
        let none = |_: &str| false;
        let all = |_: &str| true;
        let only_rbac = |f: &str| f == "rbac";

        // unknown license never locks
        assert!(!is_tab_locked(SettingsTab::Relay, none, false));
        assert!(!is_tab_locked(SettingsTab::Relay, all, false));

        assert!(is_tab_locked(SettingsTab::Relay, none, true));
        assert!(!is_tab_locked(SettingsTab::Relay, all, true));
        assert!(!is_tab_locked(SettingsTab::Roles, only_rbac, true));
        assert!(is_tab_locked(SettingsTab::Audit, only_rbac, true));
        assert!(!is_tab_locked(SettingsTab::General, none, true));
    }
}
