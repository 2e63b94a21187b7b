//! Point filtering, pagination and derived aggregates (rollups, series, facets)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::index::{normalize_rollup_id, subject_key_for_point};
use super::{
    day_key, viewer_offset, Mode, Outcome, PointsFacets, PointsSeriesBucket, ProtectionRollup,
    Provider, RecoveryPoint,
};

/// Longest window a series request may span
const MAX_SERIES_DAYS: i64 = 731;

/// Filters shared by the points, rollups, series and facets endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPointsOptions {
    pub provider: Option<Provider>,
    pub kind: String,
    pub mode: Option<Mode>,
    pub outcome: Option<Outcome>,
    pub subject_resource_id: String,
    pub rollup_id: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub query: String,
    pub cluster: String,
    pub node: String,
    pub namespace: String,
    pub workload_only: bool,
    /// "verified", "unverified" or "unknown"; anything else is ignored
    pub verification: String,
    pub page: i64,
    pub limit: i64,
}

/// Page size bounds applied to list requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_limit: 100, max_limit: 500 }
    }
}

impl PageLimits {
    pub fn limit(&self, raw: i64) -> i64 {
        if raw <= 0 {
            self.default_limit
        } else {
            raw.min(self.max_limit)
        }
    }

    pub fn page(&self, raw: i64) -> i64 {
        raw.max(1)
    }
}

/// Equality filters every endpoint honours
fn matches_identity(p: &RecoveryPoint, opts: &ListPointsOptions, rollup_id: &str) -> bool {
    if let Some(provider) = opts.provider {
        if p.provider != Some(provider) {
            return false;
        }
    }
    let kind = opts.kind.trim();
    if !kind.is_empty() && p.kind.trim() != kind {
        return false;
    }
    if let Some(mode) = opts.mode {
        if p.mode != mode {
            return false;
        }
    }
    if let Some(outcome) = opts.outcome {
        if p.outcome != outcome {
            return false;
        }
    }
    if !rollup_id.is_empty() {
        subject_key_for_point(p) == rollup_id
    } else {
        let rid = opts.subject_resource_id.trim();
        rid.is_empty() || p.subject_resource_id.trim() == rid
    }
}

/// Apply all point-level filters. Points that never completed are kept
/// regardless of the time window.
pub fn filter_points(points: &[RecoveryPoint], opts: &ListPointsOptions) -> Vec<RecoveryPoint> {
    let rollup_id = normalize_rollup_id(&opts.rollup_id);
    let cluster = opts.cluster.trim();
    let node = opts.node.trim();
    let namespace = opts.namespace.trim();
    let needle = opts.query.trim().to_lowercase();
    let verification = opts.verification.trim().to_lowercase();

    points
        .iter()
        .filter(|p| {
            if !matches_identity(p, opts, &rollup_id) {
                return false;
            }
            if let Some(completed) = super::valid_time(p.completed_at) {
                if opts.from.is_some_and(|from| completed < from) {
                    return false;
                }
                if opts.to.is_some_and(|to| completed > to) {
                    return false;
                }
            }

            let labels = p.labels();
            if !cluster.is_empty() && labels.cluster_label.trim() != cluster {
                return false;
            }
            if !node.is_empty() && labels.node_host_label.trim() != node {
                return false;
            }
            if !namespace.is_empty() && labels.namespace_label.trim() != namespace {
                return false;
            }
            if opts.workload_only && !labels.is_workload {
                return false;
            }
            let verified_ok = match verification.as_str() {
                "verified" => p.verified == Some(true),
                "unverified" => p.verified == Some(false),
                "unknown" => p.verified.is_none(),
                _ => true,
            };
            if !verified_ok {
                return false;
            }
            if !needle.is_empty() {
                let hay = format!(
                    "{} {} {} {} {} {}",
                    p.id.trim(),
                    p.provider.map(|v| v.as_str()).unwrap_or(""),
                    p.kind.trim(),
                    p.mode,
                    p.outcome,
                    labels.search_text(),
                )
                .to_lowercase();
                if !hay.contains(&needle) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Rollup filters: identity plus a window on completed-else-started time
pub fn filter_points_for_rollups(points: &[RecoveryPoint], opts: &ListPointsOptions) -> Vec<RecoveryPoint> {
    let rollup_id = normalize_rollup_id(&opts.rollup_id);
    points
        .iter()
        .filter(|p| matches_identity(p, opts, &rollup_id))
        .filter(|p| match p.timestamp() {
            Some(ts) => !opts.from.is_some_and(|from| ts < from) && !opts.to.is_some_and(|to| ts > to),
            None => true,
        })
        .cloned()
        .collect()
}

/// Newest completion first, never-completed points last, then id descending
pub fn sort_points(points: &mut [RecoveryPoint]) {
    points.sort_by(|a, b| {
        let ta = super::valid_time(a.completed_at);
        let tb = super::valid_time(b.completed_at);
        match (ta, tb) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| b.id.cmp(&a.id))
    });
}

/// Slice out one page; out-of-range pages are empty
pub fn paginate<T: Clone>(items: &[T], page: i64, limit: i64, limits: PageLimits) -> Vec<T> {
    let limit = limits.limit(limit) as usize;
    let page = limits.page(page) as usize;
    let offset = (page - 1).saturating_mul(limit);
    if offset >= items.len() {
        return Vec::new();
    }
    let end = (offset + limit).min(items.len());
    items[offset..end].to_vec()
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    (total + limit - 1) / limit
}

struct RollupAcc<'a> {
    newest: &'a RecoveryPoint,
    newest_ts: DateTime<Utc>,
    last_success: Option<DateTime<Utc>>,
    providers: BTreeSet<Provider>,
}

/// Group points into per-subject rollups, newest attempt first
pub fn build_rollups_from_points(points: &[RecoveryPoint]) -> Vec<ProtectionRollup> {
    let mut groups: HashMap<String, RollupAcc<'_>> = HashMap::new();

    for p in points {
        let key = subject_key_for_point(p);
        if key.is_empty() {
            continue;
        }
        let Some(ts) = p.timestamp() else { continue };

        let acc = groups.entry(key).or_insert_with(|| RollupAcc {
            newest: p,
            newest_ts: ts,
            last_success: None,
            providers: BTreeSet::new(),
        });
        if ts > acc.newest_ts || (ts == acc.newest_ts && p.id > acc.newest.id) {
            acc.newest = p;
            acc.newest_ts = ts;
        }
        if p.outcome == Outcome::Success && acc.last_success.is_none_or(|s| ts > s) {
            acc.last_success = Some(ts);
        }
        if let Some(provider) = p.provider {
            acc.providers.insert(provider);
        }
    }

    let mut rollups: Vec<ProtectionRollup> = groups
        .into_iter()
        .map(|(key, acc)| ProtectionRollup {
            rollup_id: key,
            subject_resource_id: acc.newest.subject_resource_id.trim().to_string(),
            subject_ref: acc.newest.subject_ref.clone(),
            last_attempt_at: Some(acc.newest_ts),
            last_success_at: acc.last_success,
            last_outcome: acc.newest.outcome,
            providers: acc.providers.into_iter().collect(),
        })
        .collect();

    rollups.sort_by(|a, b| {
        b.last_attempt_at
            .cmp(&a.last_attempt_at)
            .then_with(|| a.rollup_id.cmp(&b.rollup_id))
    });
    rollups
}

/// Day buckets of completed points in the viewer's offset, one bucket per
/// calendar day of the window (empty days included)
pub fn build_series(
    points: &[RecoveryPoint],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    tz_offset_minutes: i32,
    now: DateTime<Utc>,
) -> Vec<PointsSeriesBucket> {
    let offset = viewer_offset(tz_offset_minutes);

    let mut start = from.unwrap_or(now - Duration::days(29));
    let mut end = to.unwrap_or(now);
    if end < start {
        std::mem::swap(&mut start, &mut end);
    }
    let end_day: NaiveDate = end.with_timezone(&offset).date_naive();
    let mut start_day: NaiveDate = start.with_timezone(&offset).date_naive();
    if (end_day - start_day).num_days() >= MAX_SERIES_DAYS {
        start_day = end_day - Duration::days(MAX_SERIES_DAYS - 1);
    }

    let mut buckets: BTreeMap<String, PointsSeriesBucket> = BTreeMap::new();
    for p in points {
        let Some(completed) = super::valid_time(p.completed_at) else { continue };
        let day = day_key(completed, offset);
        let b = buckets.entry(day.clone()).or_insert_with(|| PointsSeriesBucket { day, ..Default::default() });
        b.total += 1;
        match p.mode {
            Mode::Snapshot => b.snapshot += 1,
            Mode::Remote => b.remote += 1,
            Mode::Local => b.local += 1,
        }
    }

    let mut out = Vec::new();
    let mut day = start_day;
    while day <= end_day {
        let key = day.format("%Y-%m-%d").to_string();
        out.push(buckets.remove(&key).unwrap_or(PointsSeriesBucket { day: key, ..Default::default() }));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}

/// Distinct filter values present in a set of points
pub fn build_facets(points: &[RecoveryPoint]) -> PointsFacets {
    let mut clusters = BTreeSet::new();
    let mut nodes = BTreeSet::new();
    let mut namespaces = BTreeSet::new();
    let mut facets = PointsFacets::default();

    for p in points {
        let labels = p.labels();
        for (set, value) in [
            (&mut clusters, &labels.cluster_label),
            (&mut nodes, &labels.node_host_label),
            (&mut namespaces, &labels.namespace_label),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                set.insert(value.to_string());
            }
        }
        if !labels.entity_id_label.trim().is_empty() {
            facets.has_entity_id = true;
        }
        if p.size_bytes.is_some_and(|s| s > 0) {
            facets.has_size = true;
        }
        if p.verified.is_some() {
            facets.has_verification = true;
        }
    }

    facets.clusters = clusters.into_iter().collect();
    facets.nodes_hosts = nodes.into_iter().collect();
    facets.namespaces = namespaces.into_iter().collect();
    facets
}
