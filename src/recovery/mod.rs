//! Recovery: canonical backup/snapshot data model
//!
//! Every provider (Proxmox VE/PBS/PMG, Docker, Kubernetes, TrueNAS, host agents)
//! reports discrete recovery points. Points are grouped into per-subject
//! protection rollups, day-bucketed series and filter facets.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod index;
pub mod query;

pub use index::{derive_index, subject_label, PointIndex};
pub use query::{
    build_facets, build_rollups_from_points, build_series, filter_points, filter_points_for_rollups, paginate,
    total_pages, ListPointsOptions, PageLimits,
};

// ─── Enumerations ───

/// Source system that produced a recovery point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "proxmox-pve")]
    ProxmoxPve,
    #[serde(rename = "proxmox-pbs")]
    ProxmoxPbs,
    #[serde(rename = "proxmox-pmg")]
    ProxmoxPmg,
    #[serde(rename = "docker")]
    Docker,
    #[serde(rename = "kubernetes")]
    Kubernetes,
    #[serde(rename = "truenas")]
    TrueNas,
    #[serde(rename = "host-agent")]
    HostAgent,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Self::ProxmoxPve,
        Self::ProxmoxPbs,
        Self::ProxmoxPmg,
        Self::Docker,
        Self::Kubernetes,
        Self::TrueNas,
        Self::HostAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProxmoxPve => "proxmox-pve",
            Self::ProxmoxPbs => "proxmox-pbs",
            Self::ProxmoxPmg => "proxmox-pmg",
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::TrueNas => "truenas",
            Self::HostAgent => "host-agent",
        }
    }

    /// Case-insensitive parse of the wire name; `None` for blanks and unknown names
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == raw)
    }

    /// Human label used by the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProxmoxPve => "Proxmox VE",
            Self::ProxmoxPbs => "Proxmox Backup Server",
            Self::ProxmoxPmg => "Proxmox Mail Gateway",
            Self::Docker => "Docker",
            Self::Kubernetes => "Kubernetes",
            Self::TrueNas => "TrueNAS",
            Self::HostAgent => "Host Agent",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Artifact mode of a recovery point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Snapshot,
    #[default]
    Local,
    Remote,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Self::Snapshot, Self::Local, Self::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    /// Anything that is not a snapshot or a remote copy counts as local
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "snapshot" => Self::Snapshot,
            "remote" => Self::Remote,
            _ => Self::Local,
        }
    }

    /// Strict parse for filter input (blank or unknown means "no filter")
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == raw)
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::normalize(&raw))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a backup attempt. Exactly one per point and per rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Warning,
    Failed,
    Running,
    #[default]
    Unknown,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [Self::Success, Self::Warning, Self::Failed, Self::Running, Self::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Unknown => "unknown",
        }
    }

    /// Map any provider status string onto the outcome taxonomy
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "success" | "ok" | "succeeded" | "completed" => Self::Success,
            "warning" | "warn" => Self::Warning,
            "failed" | "fail" | "failure" | "error" => Self::Failed,
            "running" | "in-progress" | "in_progress" | "pending" | "queued" => Self::Running,
            _ => Self::Unknown,
        }
    }

    /// Strict parse for filter input
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|o| o.as_str() == raw)
    }

    /// Sort rank: most urgent first
    pub fn severity_rank(&self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::Warning => 1,
            Self::Running => 2,
            Self::Unknown => 3,
            Self::Success => 4,
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::normalize(&raw))
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Data Types ───

/// Reference to an object outside the unified resource model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRef {
    #[serde(rename = "type", default)]
    pub ref_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
}

impl ExternalRef {
    pub fn is_typed(&self) -> bool {
        !self.ref_type.trim().is_empty()
    }
}

/// Precomputed label hints attached to every point served to the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPointDisplay {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_type: String,
    #[serde(default)]
    pub is_workload: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_host_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_id_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details_summary: String,
}

/// One discrete, immutable backup or snapshot record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    /// Provider-specific artifact kind ("backup", "snapshot", "volumesnapshot", ...)
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_resource_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ref: Option<ExternalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_ref: Option<ExternalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<RecoveryPointDisplay>,
}

impl RecoveryPoint {
    /// Best-known event time: completion, else start
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        valid_time(self.completed_at).or_else(|| valid_time(self.started_at))
    }

    /// Display labels, derived on the fly when the point carries none
    pub fn labels(&self) -> PointIndex {
        match &self.display {
            Some(d) => PointIndex::from(d),
            None => derive_index(self),
        }
    }

    /// Fill in `display` if missing
    pub fn ensure_display(&mut self) {
        if self.display.is_none() {
            self.display = derive_index(self).to_display();
        }
    }
}

/// Per-subject aggregate of the latest backup attempt status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionRollup {
    pub rollup_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ref: Option<ExternalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_outcome: Outcome,
    #[serde(default)]
    pub providers: Vec<Provider>,
}

impl ProtectionRollup {
    /// Name shown in the protected-items table
    pub fn subject_label(&self) -> String {
        subject_label(self.subject_ref.as_ref(), &self.subject_resource_id, &self.rollup_id)
    }
}

/// One day of the timeline, counted by artifact mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSeriesBucket {
    pub day: String,
    pub total: u64,
    pub snapshot: u64,
    pub local: u64,
    pub remote: u64,
}

/// Distinct values for the filter dropdowns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsFacets {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub nodes_hosts: Vec<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub has_size: bool,
    #[serde(default)]
    pub has_verification: bool,
    #[serde(default, rename = "hasEntityId")]
    pub has_entity_id: bool,
}

/// Paging metadata returned next to list responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

// ─── Time helpers ───

/// Timestamps at or before the Unix epoch are treated as absent
pub fn valid_time(t: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    t.filter(|t| t.timestamp_millis() > 0)
}

/// Viewer offset in minutes east of UTC, clamped to a valid offset
pub fn viewer_offset(minutes_east: i32) -> FixedOffset {
    let minutes = minutes_east.clamp(-(23 * 60 + 59), 23 * 60 + 59);
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Calendar day key (YYYY-MM-DD) of an instant as seen by the viewer
pub fn day_key(t: DateTime<Utc>, offset: FixedOffset) -> String {
    t.with_timezone(&offset).format("%Y-%m-%d").to_string()
}
