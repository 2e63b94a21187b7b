//! Query-string contracts for the dashboard's deep links
//!
//! Each page has a `build_*_path` / `parse_*_link_search` pair. Empty values
//! are omitted when building, and the legacy `search` key is read as `q`.

// ─── Query string helpers ───

/// Ordered key/value pairs rendered as a query string
#[derive(Debug, Default)]
pub(crate) struct QueryBuilder {
    pairs: Vec<(&'static str, String)>,
}

impl QueryBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `key=value` unless the value is blank
    pub(crate) fn push(&mut self, key: &'static str, value: &str) -> &mut Self {
        let value = value.trim();
        if !value.is_empty() {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `base` plus `?query` when anything was pushed
    pub(crate) fn path(&self, base: &str) -> String {
        if self.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, self.query_string())
        }
    }
}

/// Parsed query string; the first occurrence of a key wins
#[derive(Debug, Default, Clone)]
pub(crate) struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Accepts `a=b`, `?a=b` or a full `/path?a=b`
    pub(crate) fn parse(search: &str) -> Self {
        let raw = search.split_once('?').map(|(_, q)| q).unwrap_or(search);
        let raw = raw.split('#').next().unwrap_or("");
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (k, v) = part.split_once('=').unwrap_or((part, ""));
                (decode(k), decode(v))
            })
            .collect();
        Self { pairs }
    }

    /// Trimmed value of the first non-blank key among `keys`
    pub(crate) fn get(&self, keys: &[&str]) -> String {
        keys.iter()
            .find_map(|key| {
                self.pairs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.trim())
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or("")
            .to_string()
    }
}

fn decode(raw: &str) -> String {
    let plus = raw.replace('+', " ");
    urlencoding::decode(&plus)
        .map(|s| s.into_owned())
        .unwrap_or(plus)
}

// ─── Workloads ───

pub const WORKLOADS_PATH: &str = "/workloads";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadsLinkParams {
    pub workload_type: String,
    pub context: String,
    pub host: String,
    pub resource: String,
}

pub fn build_workloads_path(params: &WorkloadsLinkParams) -> String {
    QueryBuilder::new()
        .push("type", &params.workload_type)
        .push("context", &params.context)
        .push("host", &params.host)
        .push("resource", &params.resource)
        .path(WORKLOADS_PATH)
}

pub fn parse_workloads_link_search(search: &str) -> WorkloadsLinkParams {
    let q = QueryParams::parse(search);
    WorkloadsLinkParams {
        workload_type: q.get(&["type"]),
        context: q.get(&["context"]),
        host: q.get(&["host"]),
        resource: q.get(&["resource"]),
    }
}

// ─── Infrastructure ───

pub const INFRASTRUCTURE_PATH: &str = "/infrastructure";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfrastructureLinkParams {
    pub source: String,
    pub query: String,
    pub resource: String,
}

pub fn build_infrastructure_path(params: &InfrastructureLinkParams) -> String {
    QueryBuilder::new()
        .push("source", &params.source)
        .push("q", &params.query)
        .push("resource", &params.resource)
        .path(INFRASTRUCTURE_PATH)
}

pub fn parse_infrastructure_link_search(search: &str) -> InfrastructureLinkParams {
    let q = QueryParams::parse(search);
    InfrastructureLinkParams {
        source: q.get(&["source"]),
        query: q.get(&["q", "search"]),
        resource: q.get(&["resource"]),
    }
}

// ─── Storage ───

pub const STORAGE_PATH: &str = "/storage";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageLinkParams {
    pub tab: String,
    pub group: String,
    pub source: String,
    pub status: String,
    pub node: String,
    pub query: String,
    pub resource: String,
    pub sort: String,
    pub order: String,
}

pub fn build_storage_path(params: &StorageLinkParams) -> String {
    QueryBuilder::new()
        .push("tab", &params.tab)
        .push("group", &params.group)
        .push("source", &params.source)
        .push("status", &params.status)
        .push("node", &params.node)
        .push("q", &params.query)
        .push("resource", &params.resource)
        .push("sort", &params.sort)
        .push("order", &params.order)
        .path(STORAGE_PATH)
}

pub fn parse_storage_link_search(search: &str) -> StorageLinkParams {
    let q = QueryParams::parse(search);
    StorageLinkParams {
        tab: q.get(&["tab"]),
        group: q.get(&["group"]),
        source: q.get(&["source"]),
        status: q.get(&["status"]),
        node: q.get(&["node"]),
        query: q.get(&["q", "search"]),
        resource: q.get(&["resource"]),
        sort: q.get(&["sort"]),
        order: q.get(&["order"]),
    }
}

// ─── Recovery / Backups ───

pub const RECOVERY_PATH: &str = "/recovery";
pub const BACKUPS_PATH: &str = "/backups";

/// Recovery page link fields. The legacy Backups page carries the same
/// fields with `type`, `source` and `backupType` in place of `rollupId`,
/// `provider` and `mode`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryLinkParams {
    pub view: String,
    pub rollup_id: String,
    pub provider: String,
    pub cluster: String,
    pub namespace: String,
    pub mode: String,
    pub scope: String,
    pub status: String,
    pub verification: String,
    pub node: String,
    pub query: String,
}

impl RecoveryLinkParams {
    /// Append every field using the current (v2) keys
    pub(crate) fn push_into(&self, qb: &mut QueryBuilder) {
        self.push_with_keys(qb, "rollupId", "provider", "mode");
    }

    fn push_with_keys(&self, qb: &mut QueryBuilder, rollup_key: &'static str, provider_key: &'static str, mode_key: &'static str) {
        qb.push("view", &self.view)
            .push(rollup_key, &self.rollup_id)
            .push(provider_key, &self.provider)
            .push("cluster", &self.cluster)
            .push("namespace", &self.namespace)
            .push(mode_key, &self.mode)
            .push("scope", &self.scope)
            .push("status", &self.status)
            .push("verification", &self.verification)
            .push("node", &self.node)
            .push("q", &self.query);
    }

    pub(crate) fn from_params(q: &QueryParams) -> Self {
        Self {
            view: q.get(&["view"]),
            rollup_id: q.get(&["rollupId", "type"]),
            provider: q.get(&["provider", "source"]),
            cluster: q.get(&["cluster"]),
            namespace: q.get(&["namespace"]),
            mode: q.get(&["mode", "backupType"]),
            scope: q.get(&["scope"]),
            status: q.get(&["status"]),
            verification: q.get(&["verification"]),
            node: q.get(&["node"]),
            query: q.get(&["q", "search"]),
        }
    }
}

pub fn build_recovery_path(params: &RecoveryLinkParams) -> String {
    let mut qb = QueryBuilder::new();
    params.push_into(&mut qb);
    qb.path(RECOVERY_PATH)
}

/// Link into the legacy Backups page (v1 keys)
pub fn build_backups_path(params: &RecoveryLinkParams) -> String {
    let mut qb = QueryBuilder::new();
    params.push_with_keys(&mut qb, "type", "source", "backupType");
    qb.path(BACKUPS_PATH)
}

/// Parse either key set; v2 keys win when both are present
pub fn parse_recovery_link_search(search: &str) -> RecoveryLinkParams {
    RecoveryLinkParams::from_params(&QueryParams::parse(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workloads_round_trip() {
        let params = WorkloadsLinkParams {
            workload_type: "k8s".into(),
            context: "prod cluster".into(),
            host: "node-1".into(),
            resource: "k8s:pod/web".into(),
        };
        let path = build_workloads_path(&params);
        assert_eq!(path, "/workloads?type=k8s&context=prod%20cluster&host=node-1&resource=k8s%3Apod%2Fweb");
        assert_eq!(parse_workloads_link_search(&path), params);
        assert_eq!(build_workloads_path(&WorkloadsLinkParams::default()), "/workloads");
    }

    #[test]
    fn test_infrastructure_round_trip_and_legacy_search() {
        let params = InfrastructureLinkParams {
            source: "proxmox".into(),
            query: "pve & friends".into(),
            resource: "node/pve1".into(),
        };
        assert_eq!(parse_infrastructure_link_search(&build_infrastructure_path(&params)), params);

        let legacy = parse_infrastructure_link_search("?search=web+01&source=agent");
        assert_eq!(legacy.query, "web 01");
        assert_eq!(legacy.source, "agent");
        assert_eq!(parse_infrastructure_link_search("?q=new&search=old").query, "new");
    }

    #[test]
    fn test_storage_round_trip_all_fields() {
        let params = StorageLinkParams {
            tab: "pools".into(),
            group: "node".into(),
            source: "pbs".into(),
            status: "degraded".into(),
            node: "pve-a".into(),
            query: "tank/apps".into(),
            resource: "storage:1".into(),
            sort: "usage".into(),
            order: "desc".into(),
        };
        assert_eq!(parse_storage_link_search(&build_storage_path(&params)), params);
        assert_eq!(parse_storage_link_search("search=ceph").query, "ceph");
    }

    fn recovery_params() -> RecoveryLinkParams {
        RecoveryLinkParams {
            view: "events".into(),
            rollup_id: "res:vm-101".into(),
            provider: "proxmox-pbs".into(),
            cluster: "prod".into(),
            namespace: "default".into(),
            mode: "remote".into(),
            scope: "workload".into(),
            status: "failed".into(),
            verification: "unverified".into(),
            node: "pve-a".into(),
            query: "web 01".into(),
        }
    }

    #[test]
    fn test_recovery_round_trip_v2() {
        let params = recovery_params();
        let path = build_recovery_path(&params);
        assert!(path.starts_with("/recovery?view=events&rollupId=res%3Avm-101&provider=proxmox-pbs"));
        assert_eq!(parse_recovery_link_search(&path), params);
    }

    #[test]
    fn test_backups_v1_keys_round_trip() {
        let params = recovery_params();
        let path = build_backups_path(&params);
        assert!(path.contains("type=res%3Avm-101"));
        assert!(path.contains("source=proxmox-pbs"));
        assert!(path.contains("backupType=remote"));
        assert!(!path.contains("rollupId="));
        assert_eq!(parse_recovery_link_search(&path), params);

        let legacy = parse_recovery_link_search("/backups?search=db&source=docker");
        assert_eq!(legacy.query, "db");
        assert_eq!(legacy.provider, "docker");
    }

    #[test]
    fn test_blank_values_are_dropped() {
        let params = InfrastructureLinkParams { source: "  ".into(), ..Default::default() };
        assert_eq!(build_infrastructure_path(&params), "/infrastructure");
        assert_eq!(parse_infrastructure_link_search("?source=&q=%20"), InfrastructureLinkParams::default());
    }
}
