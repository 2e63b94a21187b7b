//! Protected-items table: rollup request, local filtering, summary and sorting

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

use super::filters::FilterState;
use crate::recovery::{valid_time, Outcome, ProtectionRollup, Provider};

/// A subject whose last success (or last attempt) is this old is stale
pub const STALE_AFTER_DAYS: i64 = 7;

/// Server-side part of the rollups query; paging is added by the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupsRequest {
    pub query: String,
    pub provider: Option<Provider>,
}

impl RollupsRequest {
    pub fn from_filters(filters: &FilterState) -> Self {
        Self { query: filters.query.trim().to_string(), provider: filters.provider }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.query.is_empty() {
            pairs.push(("q", self.query.clone()));
        }
        if let Some(p) = self.provider {
            pairs.push(("provider", p.as_str().to_string()));
        }
        pairs
    }
}

// ─── Filtering ───

fn search_text(r: &ProtectionRollup) -> String {
    let mut parts = vec![r.subject_label(), r.rollup_id.clone(), r.subject_resource_id.clone()];
    if let Some(subject) = &r.subject_ref {
        parts.push(subject.namespace.clone());
        parts.push(subject.name.clone());
        if !subject.namespace.is_empty() && !subject.name.is_empty() {
            parts.push(format!("{}/{}", subject.namespace, subject.name));
        }
    }
    for p in &r.providers {
        parts.push(p.as_str().to_string());
        parts.push(p.label().to_string());
    }
    parts.push(r.last_outcome.as_str().to_string());
    parts.join(" ").to_lowercase()
}

/// Provider membership plus case-insensitive free text
pub fn filter_rollups(rollups: &[ProtectionRollup], provider: Option<Provider>, query: &str) -> Vec<ProtectionRollup> {
    let needle = query.trim().to_lowercase();
    rollups
        .iter()
        .filter(|r| provider.is_none_or(|p| r.providers.contains(&p)))
        .filter(|r| needle.is_empty() || search_text(r).contains(&needle))
        .cloned()
        .collect()
}

/// Newest attempt first, never-attempted last, then rollup id ascending
pub fn sort_rollups_default(rollups: &mut [ProtectionRollup]) {
    rollups.sort_by(|a, b| {
        let ta = valid_time(a.last_attempt_at);
        let tb = valid_time(b.last_attempt_at);
        ta.is_none()
            .cmp(&tb.is_none())
            .then_with(|| tb.cmp(&ta))
            .then_with(|| a.rollup_id.cmp(&b.rollup_id))
    });
}

// ─── Summary ───

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: usize,
    pub warning: usize,
    pub failed: usize,
    pub running: usize,
    pub unknown: usize,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Warning => self.warning += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Running => self.running += 1,
            Outcome::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Success => self.success,
            Outcome::Warning => self.warning,
            Outcome::Failed => self.failed,
            Outcome::Running => self.running,
            Outcome::Unknown => self.unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupsSummary {
    pub counts: OutcomeCounts,
    pub stale: usize,
    pub never_succeeded: usize,
    pub total: usize,
}

/// Stale when the last success is at least 7 days old; subjects that never
/// succeeded are judged by their last attempt instead
pub fn is_rollup_stale(rollup: &ProtectionRollup, now: DateTime<Utc>) -> bool {
    let threshold = Duration::days(STALE_AFTER_DAYS);
    if let Some(success) = valid_time(rollup.last_success_at) {
        return now - success >= threshold;
    }
    if let Some(attempt) = valid_time(rollup.last_attempt_at) {
        return now - attempt >= threshold;
    }
    false
}

pub fn never_succeeded(rollup: &ProtectionRollup) -> bool {
    valid_time(rollup.last_attempt_at).is_some() && valid_time(rollup.last_success_at).is_none()
}

pub fn summarize(rollups: &[ProtectionRollup], now: DateTime<Utc>) -> RollupsSummary {
    let mut summary = RollupsSummary { total: rollups.len(), ..Default::default() };
    for r in rollups {
        summary.counts.add(r.last_outcome);
        if is_rollup_stale(r, now) {
            summary.stale += 1;
        }
        if never_succeeded(r) {
            summary.never_succeeded += 1;
        }
    }
    summary
}

/// Outcome and stale-only narrowing, applied after the summary
pub fn apply_secondary_filter(
    rollups: &[ProtectionRollup],
    outcome: Option<Outcome>,
    stale_only: bool,
    now: DateTime<Utc>,
) -> Vec<ProtectionRollup> {
    rollups
        .iter()
        .filter(|r| outcome.is_none_or(|o| r.last_outcome == o))
        .filter(|r| !stale_only || is_rollup_stale(r, now))
        .cloned()
        .collect()
}

// ─── Column sorting ───

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupColumn {
    Subject,
    Source,
    LastBackup,
    Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn flip(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupSort {
    pub column: RollupColumn,
    pub direction: SortDirection,
}

impl Default for RollupSort {
    fn default() -> Self {
        Self { column: RollupColumn::LastBackup, direction: SortDirection::Desc }
    }
}

impl RollupSort {
    /// Header click: same column flips, a new column starts ascending
    pub fn toggle(&mut self, column: RollupColumn) {
        if self.column == column {
            self.direction = self.direction.flip();
        } else {
            self.column = column;
            self.direction = SortDirection::Asc;
        }
    }

    fn compare(&self, a: &ProtectionRollup, b: &ProtectionRollup) -> Ordering {
        match self.column {
            RollupColumn::Subject => a.subject_label().to_lowercase().cmp(&b.subject_label().to_lowercase()),
            RollupColumn::Source => source_key(a).cmp(&source_key(b)),
            RollupColumn::LastBackup => valid_time(a.last_attempt_at).cmp(&valid_time(b.last_attempt_at)),
            // ascending puts the most urgent first
            RollupColumn::Outcome => a.last_outcome.severity_rank().cmp(&b.last_outcome.severity_rank()),
        }
    }

    /// Stable sort with rollup id as the final tie-breaker
    pub fn sort(&self, rollups: &mut [ProtectionRollup]) {
        rollups.sort_by(|a, b| {
            let ord = self.compare(a, b);
            let ord = match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then_with(|| a.rollup_id.cmp(&b.rollup_id))
        });
    }
}

fn source_key(r: &ProtectionRollup) -> String {
    r.providers.iter().map(|p| p.label()).collect::<Vec<_>>().join(", ").to_lowercase()
}

// ─── View ───

/// Everything the protected-items panel renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollupsView {
    pub summary: RollupsSummary,
    pub rows: Vec<ProtectionRollup>,
}

impl RollupsView {
    pub fn compute(
        rollups: &[ProtectionRollup],
        filters: &FilterState,
        sort: RollupSort,
        stale_only: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let mut filtered = filter_rollups(rollups, filters.provider, &filters.query);
        sort_rollups_default(&mut filtered);
        let summary = summarize(&filtered, now);
        let mut rows = apply_secondary_filter(&filtered, filters.outcome, stale_only, now);
        sort.sort(&mut rows);
        Self { summary, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::ExternalRef;

    fn now() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    fn rollup(id: &str, outcome: Outcome, attempt_days_ago: Option<i64>, success_days_ago: Option<i64>) -> ProtectionRollup {
        ProtectionRollup {
            rollup_id: id.into(),
            last_outcome: outcome,
            last_attempt_at: attempt_days_ago.map(|d| now() - Duration::days(d)),
            last_success_at: success_days_ago.map(|d| now() - Duration::days(d)),
            providers: vec![Provider::ProxmoxPve],
            ..Default::default()
        }
    }

    #[test]
    fn test_staleness() {
        assert!(is_rollup_stale(&rollup("a", Outcome::Success, Some(8), Some(8)), now()));
        assert!(!is_rollup_stale(&rollup("a", Outcome::Success, Some(6), Some(6)), now()));
        assert!(is_rollup_stale(&rollup("a", Outcome::Failed, Some(8), None), now()));
        // a recent failure does not hide an old success
        assert!(is_rollup_stale(&rollup("a", Outcome::Failed, Some(1), Some(9)), now()));
        assert!(!is_rollup_stale(&rollup("a", Outcome::Unknown, None, None), now()));

        let mut epoch = rollup("a", Outcome::Success, None, None);
        epoch.last_success_at = DateTime::from_timestamp(0, 0);
        assert!(!is_rollup_stale(&epoch, now()));
    }

    #[test]
    fn test_summary_counts() {
        let rollups = vec![
            ProtectionRollup {
                rollup_id: "a".into(),
                last_outcome: Outcome::Failed,
                last_attempt_at: Some(now()),
                ..Default::default()
            },
            ProtectionRollup {
                rollup_id: "b".into(),
                last_outcome: Outcome::Success,
                last_success_at: Some(now()),
                ..Default::default()
            },
        ];
        let summary = summarize(&rollups, now());
        assert_eq!(summary.counts, OutcomeCounts { failed: 1, success: 1, ..Default::default() });
        assert_eq!(summary.never_succeeded, 1);
        assert_eq!(summary.stale, 0);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn test_filter_by_provider_and_text() {
        let mut docker = rollup("ext:abc", Outcome::Success, Some(1), Some(1));
        docker.providers = vec![Provider::Docker];
        docker.subject_ref = Some(ExternalRef {
            ref_type: "k8s-pvc".into(),
            namespace: "Media".into(),
            name: "nextcloud".into(),
            ..Default::default()
        });
        let rollups = vec![rollup("res:vm-1", Outcome::Failed, Some(1), None), docker];

        assert_eq!(filter_rollups(&rollups, Some(Provider::Docker), "").len(), 1);
        assert_eq!(filter_rollups(&rollups, None, "media/NEXT")[0].rollup_id, "ext:abc");
        assert_eq!(filter_rollups(&rollups, None, "failed")[0].rollup_id, "res:vm-1");
        assert_eq!(filter_rollups(&rollups, None, "Proxmox VE").len(), 1);
        assert!(filter_rollups(&rollups, Some(Provider::TrueNas), "").is_empty());
    }

    #[test]
    fn test_default_sort() {
        let mut rollups = vec![
            rollup("c", Outcome::Success, None, None),
            rollup("b", Outcome::Success, Some(1), None),
            rollup("a", Outcome::Success, Some(1), None),
            rollup("d", Outcome::Success, Some(0), None),
        ];
        sort_rollups_default(&mut rollups);
        let ids: Vec<_> = rollups.iter().map(|r| r.rollup_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_sort_toggle() {
        let mut sort = RollupSort::default();
        assert_eq!(sort.column, RollupColumn::LastBackup);
        assert_eq!(sort.direction, SortDirection::Desc);

        sort.toggle(RollupColumn::LastBackup);
        assert_eq!(sort.direction, SortDirection::Asc);
        sort.toggle(RollupColumn::Outcome);
        assert_eq!(sort, RollupSort { column: RollupColumn::Outcome, direction: SortDirection::Asc });
        sort.toggle(RollupColumn::Outcome);
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_sort_by_outcome_severity() {
        let mut rollups = vec![
            rollup("s", Outcome::Success, Some(1), Some(1)),
            rollup("f", Outcome::Failed, Some(1), None),
            rollup("w", Outcome::Warning, Some(1), None),
        ];
        RollupSort { column: RollupColumn::Outcome, direction: SortDirection::Asc }.sort(&mut rollups);
        let ids: Vec<_> = rollups.iter().map(|r| r.rollup_id.as_str()).collect();
        assert_eq!(ids, vec!["f", "w", "s"]);
    }

    #[test]
    fn test_secondary_filter_after_summary() {
        let rollups = vec![
            rollup("old", Outcome::Success, Some(10), Some(10)),
            rollup("new", Outcome::Success, Some(1), Some(1)),
            rollup("bad", Outcome::Failed, Some(1), None),
        ];
        let filters = FilterState { outcome: Some(Outcome::Success), ..Default::default() };
        let view = RollupsView::compute(&rollups, &filters, RollupSort::default(), true, now());
        assert_eq!(view.summary.total, 3);
        assert_eq!(view.summary.counts.failed, 1);
        assert_eq!(view.summary.stale, 1);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].rollup_id, "old");
    }

    #[test]
    fn test_request_pairs() {
        let filters = FilterState { query: " db ".into(), provider: Some(Provider::ProxmoxPbs), ..Default::default() };
        let pairs = RollupsRequest::from_filters(&filters).to_query_pairs();
        assert_eq!(pairs, vec![("q", "db".to_string()), ("provider", "proxmox-pbs".to_string())]);
    }
}
