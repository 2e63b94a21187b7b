//! Point index: normalised labels and stable subject keys
//!
//! Labels are derived once per point (on ingest) so filtering, searching and
//! facets behave identically no matter which provider reported the point.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::{ExternalRef, Provider, RecoveryPoint, RecoveryPointDisplay};

const RESOURCE_KEY_PREFIX: &str = "res:";
const EXTERNAL_KEY_PREFIX: &str = "ext:";

/// Normalised, searchable view of a point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointIndex {
    pub subject_label: String,
    pub subject_type: String,
    pub is_workload: bool,
    pub cluster_label: String,
    pub node_host_label: String,
    pub namespace_label: String,
    pub entity_id_label: String,
    pub repository_label: String,
    pub details_summary: String,
}

impl PointIndex {
    /// `None` when there is nothing worth showing
    pub fn to_display(&self) -> Option<RecoveryPointDisplay> {
        let labels = [
            &self.subject_label,
            &self.subject_type,
            &self.cluster_label,
            &self.node_host_label,
            &self.namespace_label,
            &self.entity_id_label,
            &self.repository_label,
            &self.details_summary,
        ];
        if !self.is_workload && labels.iter().all(|l| l.trim().is_empty()) {
            return None;
        }
        Some(RecoveryPointDisplay {
            subject_label: self.subject_label.trim().to_string(),
            subject_type: self.subject_type.trim().to_string(),
            is_workload: self.is_workload,
            cluster_label: self.cluster_label.trim().to_string(),
            node_host_label: self.node_host_label.trim().to_string(),
            namespace_label: self.namespace_label.trim().to_string(),
            entity_id_label: self.entity_id_label.trim().to_string(),
            repository_label: self.repository_label.trim().to_string(),
            details_summary: self.details_summary.trim().to_string(),
        })
    }

    /// Lowercased haystack for free-text search
    pub fn search_text(&self) -> String {
        [
            self.subject_label.as_str(),
            self.subject_type.as_str(),
            self.cluster_label.as_str(),
            self.node_host_label.as_str(),
            self.namespace_label.as_str(),
            self.entity_id_label.as_str(),
            self.repository_label.as_str(),
            self.details_summary.as_str(),
        ]
        .iter()
        .map(|s| s.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

impl From<&RecoveryPointDisplay> for PointIndex {
    fn from(d: &RecoveryPointDisplay) -> Self {
        Self {
            subject_label: d.subject_label.clone(),
            subject_type: d.subject_type.clone(),
            is_workload: d.is_workload,
            cluster_label: d.cluster_label.clone(),
            node_host_label: d.node_host_label.clone(),
            namespace_label: d.namespace_label.clone(),
            entity_id_label: d.entity_id_label.clone(),
            repository_label: d.repository_label.clone(),
            details_summary: d.details_summary.clone(),
        }
    }
}

fn is_kubernetes_type(ref_type: &str) -> bool {
    ref_type.trim().starts_with("k8s-")
}

fn is_workload_type(ref_type: &str) -> bool {
    let t = ref_type.trim();
    t.starts_with("proxmox-") || t.starts_with("k8s-") || t.starts_with("docker-")
}

/// Read a detail as trimmed text; numbers are rendered without quotes
fn detail(details: Option<&Map<String, Value>>, key: &str) -> String {
    match details.and_then(|d| d.get(key)) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn first_detail(details: Option<&Map<String, Value>>, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| detail(details, k))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

/// Name of a subject: `namespace/name` for Kubernetes objects, else the ref
/// name, else the linked resource id, else `fallback`
pub fn subject_label(subject_ref: Option<&ExternalRef>, resource_id: &str, fallback: &str) -> String {
    if let Some(r) = subject_ref {
        let name = r.name.trim();
        let namespace = r.namespace.trim();
        if !name.is_empty() {
            if is_kubernetes_type(&r.ref_type) && !namespace.is_empty() {
                return format!("{}/{}", namespace, name);
            }
            return name.to_string();
        }
    }
    let rid = resource_id.trim();
    if !rid.is_empty() {
        return rid.to_string();
    }
    fallback.trim().to_string()
}

/// Compute the normalised labels for a point
pub fn derive_index(p: &RecoveryPoint) -> PointIndex {
    let details = p.details.as_ref();
    let subject = p.subject_ref.as_ref().filter(|r| r.is_typed() || !r.name.trim().is_empty());
    let repo = p.repository_ref.as_ref();
    let provider = p.provider;

    let subject_type = subject.map(|r| r.ref_type.trim().to_string()).unwrap_or_default();

    let is_workload = match subject {
        Some(r) if r.is_typed() => is_workload_type(&r.ref_type),
        _ => !p.subject_resource_id.trim().is_empty(),
    };

    let mut cluster_label = first_detail(details, &["k8sClusterName", "instance", "cluster"]);
    if cluster_label.is_empty() && provider == Some(Provider::TrueNas) {
        cluster_label = detail(details, "hostname");
    }

    let mut node_host_label = first_detail(details, &["node", "hostname"]);
    if node_host_label.is_empty() && provider == Some(Provider::ProxmoxPve) {
        node_host_label = subject.map(|r| r.class.trim().to_string()).unwrap_or_default();
    }

    let namespace_label = match provider {
        Some(Provider::Kubernetes) => {
            let ns = detail(details, "namespace");
            if ns.is_empty() {
                subject.map(|r| r.namespace.trim().to_string()).unwrap_or_default()
            } else {
                ns
            }
        }
        Some(Provider::ProxmoxPbs) => {
            let ns = detail(details, "namespace");
            if !ns.is_empty() {
                ns
            } else {
                repo.map(|r| {
                    if r.namespace.trim().is_empty() {
                        r.class.trim().to_string()
                    } else {
                        r.namespace.trim().to_string()
                    }
                })
                .unwrap_or_default()
            }
        }
        _ => String::new(),
    };

    let mut entity_id_label = detail(details, "vmid");
    if entity_id_label.is_empty() && provider == Some(Provider::Kubernetes) {
        entity_id_label = subject.map(|r| r.uid.trim().to_string()).unwrap_or_default();
    }

    let repository_label = match repo.filter(|r| !r.name.trim().is_empty()) {
        Some(r) if !r.class.trim().is_empty() => format!("{} ({})", r.name.trim(), r.class.trim()),
        Some(r) => r.name.trim().to_string(),
        None => first_detail(details, &["targetDataset", "datastore", "repository"]),
    };

    let mut details_summary = first_detail(details, &["volid", "snapshot"]);
    if details_summary.is_empty() {
        let velero_name = detail(details, "veleroName");
        if !velero_name.is_empty() {
            let velero_ns = detail(details, "veleroNs");
            details_summary = if velero_ns.is_empty() {
                velero_name
            } else {
                format!("{}/{}", velero_ns, velero_name)
            };
        }
    }

    PointIndex {
        subject_label: subject_label(subject, &p.subject_resource_id, &p.id),
        subject_type,
        is_workload,
        cluster_label,
        node_host_label,
        namespace_label,
        entity_id_label,
        repository_label,
        details_summary,
    }
}

fn external_key(provider: Option<Provider>, r: Option<&ExternalRef>) -> String {
    let Some(r) = r.filter(|r| r.is_typed()) else {
        return String::new();
    };
    let mut hasher = Sha256::new();
    let provider = provider.map(|p| p.as_str()).unwrap_or("");
    let parts = [
        provider,
        r.ref_type.as_str(),
        r.namespace.as_str(),
        r.name.as_str(),
        r.id.as_str(),
        r.uid.as_str(),
        r.class.as_str(),
    ];
    for part in parts {
        hasher.update(part.trim().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", EXTERNAL_KEY_PREFIX, &digest[..24])
}

/// Stable grouping key for a protected subject: `res:<id>` for linked
/// resources, `ext:<hash>` for external refs, empty when neither exists
pub fn subject_key(provider: Option<Provider>, resource_id: &str, subject_ref: Option<&ExternalRef>) -> String {
    let rid = resource_id.trim();
    if !rid.is_empty() {
        return format!("{}{}", RESOURCE_KEY_PREFIX, rid);
    }
    external_key(provider, subject_ref)
}

/// Same scheme as [`subject_key`] for the storage side of a point
pub fn repository_key(provider: Option<Provider>, resource_id: &str, repository_ref: Option<&ExternalRef>) -> String {
    let rid = resource_id.trim();
    if !rid.is_empty() {
        return format!("{}{}", RESOURCE_KEY_PREFIX, rid);
    }
    external_key(provider, repository_ref)
}

pub fn subject_key_for_point(p: &RecoveryPoint) -> String {
    subject_key(p.provider, &p.subject_resource_id, p.subject_ref.as_ref())
}

/// Resource id exposed for a rollup key (`res:` stripped, `ext:` kept)
pub fn rollup_resource_id(key: &str) -> String {
    let key = key.trim();
    match key.strip_prefix(RESOURCE_KEY_PREFIX) {
        Some(rest) => rest.to_string(),
        None => key.to_string(),
    }
}

/// Accept raw unified resource ids wherever a rollup id is expected
pub fn normalize_rollup_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with(RESOURCE_KEY_PREFIX) || raw.starts_with(EXTERNAL_KEY_PREFIX) {
        raw.to_string()
    } else {
        format!("{}{}", RESOURCE_KEY_PREFIX, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(v: Value) -> Option<Map<String, Value>> {
        v.as_object().cloned()
    }

    fn ext(ref_type: &str, namespace: &str, name: &str) -> ExternalRef {
        ExternalRef {
            ref_type: ref_type.into(),
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_point_has_empty_index() {
        let idx = derive_index(&RecoveryPoint::default());
        assert_eq!(idx, PointIndex::default());
        assert!(idx.to_display().is_none());
    }

    #[test]
    fn test_proxmox_vm_index() {
        let p = RecoveryPoint {
            id: "snap-123".into(),
            provider: Some(Provider::ProxmoxPve),
            subject_ref: Some(ExternalRef { id: "vm-100".into(), ..ext("proxmox-vm", "pve-cluster", "web-server") }),
            details: details(json!({ "node": "pve1", "vmid": "100", "instance": "pve-cluster" })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "web-server");
        assert_eq!(idx.subject_type, "proxmox-vm");
        assert!(idx.is_workload);
        assert_eq!(idx.cluster_label, "pve-cluster");
        assert_eq!(idx.node_host_label, "pve1");
        assert_eq!(idx.namespace_label, "");
        assert_eq!(idx.entity_id_label, "100");
    }

    #[test]
    fn test_proxmox_lxc_node_falls_back_to_ref_class() {
        let p = RecoveryPoint {
            id: "snap-456".into(),
            provider: Some(Provider::ProxmoxPve),
            subject_resource_id: "unified-resource-123".into(),
            subject_ref: Some(ExternalRef { class: "pve2".into(), ..ext("proxmox-lxc", "", "database") }),
            details: details(json!({ "instance": "prod-cluster" })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "database");
        assert_eq!(idx.cluster_label, "prod-cluster");
        assert_eq!(idx.node_host_label, "pve2");
        assert_eq!(idx.entity_id_label, "");
    }

    #[test]
    fn test_kubernetes_pvc_index() {
        let p = RecoveryPoint {
            id: "backup-k8s-1".into(),
            provider: Some(Provider::Kubernetes),
            subject_ref: Some(ExternalRef { uid: "abc-123-def".into(), ..ext("k8s-pvc", "production", "data-volume") }),
            details: details(json!({ "k8sClusterName": "prod-eks", "namespace": "production" })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "production/data-volume");
        assert_eq!(idx.cluster_label, "prod-eks");
        assert_eq!(idx.namespace_label, "production");
        assert_eq!(idx.entity_id_label, "abc-123-def");
        assert!(idx.is_workload);
    }

    #[test]
    fn test_pbs_repository_and_namespace() {
        let p = RecoveryPoint {
            id: "pbs-backup-1".into(),
            provider: Some(Provider::ProxmoxPbs),
            subject_ref: Some(ext("proxmox-vm-backup", "", "vm-100")),
            repository_ref: Some(ExternalRef { class: "local".into(), ..ext("proxmox-pbs-datastore", "", "backup-store") }),
            details: details(json!({ "volid": "local:backup/vm-100/2024-01-15_00:00:00" })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "vm-100");
        assert_eq!(idx.namespace_label, "local");
        assert_eq!(idx.repository_label, "backup-store (local)");
        assert_eq!(idx.details_summary, "local:backup/vm-100/2024-01-15_00:00:00");
    }

    #[test]
    fn test_truenas_uses_hostname_for_cluster_and_node() {
        let p = RecoveryPoint {
            id: "truenas-snap-1".into(),
            provider: Some(Provider::TrueNas),
            subject_ref: Some(ext("truenas-dataset", "", "pool/data")),
            details: details(json!({
                "hostname": "truenas-01",
                "snapshot": "pool/data@auto-2024-01-15",
                "targetDataset": "pool/data"
            })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert!(!idx.is_workload);
        assert_eq!(idx.cluster_label, "truenas-01");
        assert_eq!(idx.node_host_label, "truenas-01");
        assert_eq!(idx.repository_label, "pool/data");
        assert_eq!(idx.details_summary, "pool/data@auto-2024-01-15");
    }

    #[test]
    fn test_velero_backup_falls_back_to_point_id() {
        let p = RecoveryPoint {
            id: "velero-backup-1".into(),
            provider: Some(Provider::Kubernetes),
            subject_ref: Some(ext("velero-backup", "", "")),
            details: details(json!({ "veleroName": "backup-2024-01-15", "veleroNs": "production" })),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "velero-backup-1");
        assert!(!idx.is_workload);
        assert_eq!(idx.details_summary, "production/backup-2024-01-15");
    }

    #[test]
    fn test_resource_only_point_is_workload() {
        let p = RecoveryPoint {
            id: "point-1".into(),
            provider: Some(Provider::HostAgent),
            subject_resource_id: "unified-resource-abc".into(),
            ..Default::default()
        };
        let idx = derive_index(&p);
        assert_eq!(idx.subject_label, "unified-resource-abc");
        assert!(idx.is_workload);
    }

    #[test]
    fn test_whitespace_only_index_has_no_display() {
        let idx = PointIndex {
            subject_label: "  ".into(),
            cluster_label: "\t".into(),
            node_host_label: "\n".into(),
            ..Default::default()
        };
        assert!(idx.to_display().is_none());
    }

    #[test]
    fn test_subject_keys() {
        assert_eq!(subject_key(Some(Provider::HostAgent), "  resource-456  ", None), "res:resource-456");
        assert_eq!(subject_key(Some(Provider::HostAgent), "   ", None), "");

        let r = ext("k8s-pvc", "production", "data-volume");
        let a = subject_key(Some(Provider::Kubernetes), "", Some(&r));
        let b = subject_key(Some(Provider::Kubernetes), "", Some(&r.clone()));
        assert!(a.starts_with("ext:"));
        assert_eq!(a, b);

        let other = ext("k8s-pvc", "production", "other-volume");
        assert_ne!(a, subject_key(Some(Provider::Kubernetes), "", Some(&other)));
        assert_eq!(repository_key(Some(Provider::ProxmoxPbs), "", None), "");
        assert_eq!(repository_key(Some(Provider::ProxmoxPbs), "repo-123", None), "res:repo-123");
    }

    #[test]
    fn test_rollup_resource_id() {
        assert_eq!(rollup_resource_id("res:unified-resource-123"), "unified-resource-123");
        assert_eq!(rollup_resource_id("ext:abc123def456"), "ext:abc123def456");
        assert_eq!(rollup_resource_id("  res:resource-456  "), "resource-456");
        assert_eq!(rollup_resource_id("other-prefix:value"), "other-prefix:value");
        assert_eq!(rollup_resource_id(""), "");
    }

    #[test]
    fn test_normalize_rollup_id() {
        assert_eq!(normalize_rollup_id("vm-100"), "res:vm-100");
        assert_eq!(normalize_rollup_id("res:vm-100"), "res:vm-100");
        assert_eq!(normalize_rollup_id("ext:abc"), "ext:abc");
        assert_eq!(normalize_rollup_id(" "), "");
    }
}
