//! Recovery point requests: time window, server query and page clamping

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::filters::{FilterState, Scope, Verification};
use crate::recovery::{viewer_offset, Mode, Outcome, PageMeta, Provider, RecoveryPoint};

/// Fixed page size of the events table
pub const POINTS_PAGE_SIZE: u32 = 200;

/// Inclusive instant range sent as `from` / `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// A whole calendar day in the viewer's offset, 00:00:00.000 through 23:59:59.999
    pub fn for_day(day: NaiveDate, tz_offset_minutes: i32) -> Option<Self> {
        let offset = viewer_offset(tz_offset_minutes);
        let from = day.and_hms_milli_opt(0, 0, 0, 0)?.and_local_timezone(offset).single()?;
        let to = day.and_hms_milli_opt(23, 59, 59, 999)?.and_local_timezone(offset).single()?;
        Some(Self { from: from.with_timezone(&Utc), to: to.with_timezone(&Utc) })
    }

    /// The last `days` calendar days ending now; the first day starts at
    /// local midnight so the timeline gets exactly `days` buckets
    pub fn last_days(days: i64, now: DateTime<Utc>, tz_offset_minutes: i32) -> Self {
        let offset = viewer_offset(tz_offset_minutes);
        let first_day = now.with_timezone(&offset).date_naive() - Duration::days(days.max(1) - 1);
        let from = Self::for_day(first_day, tz_offset_minutes)
            .map(|w| w.from)
            .unwrap_or(now - Duration::days(days.max(1)));
        Self { from, to: now }
    }

    /// Selected day if any, otherwise the chart range
    pub fn for_filters(filters: &FilterState, now: DateTime<Utc>, tz_offset_minutes: i32) -> Self {
        filters
            .day
            .and_then(|day| Self::for_day(day, tz_offset_minutes))
            .unwrap_or_else(|| Self::last_days(filters.range.days(), now, tz_offset_minutes))
    }
}

/// RFC3339 with millisecond precision and a `Z` suffix
pub(crate) fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Query descriptor for one page of recovery points
#[derive(Debug, Clone, PartialEq)]
pub struct PointsRequest {
    pub page: u32,
    pub limit: u32,
    pub rollup_id: String,
    pub provider: Option<Provider>,
    pub cluster: String,
    pub mode: Option<Mode>,
    pub outcome: Option<Outcome>,
    pub query: String,
    pub node: String,
    pub namespace: String,
    pub scope: Scope,
    pub verification: Option<Verification>,
    pub window: TimeWindow,
}

impl PointsRequest {
    pub fn from_filters(filters: &FilterState, now: DateTime<Utc>, tz_offset_minutes: i32) -> Self {
        Self {
            page: filters.page.max(1),
            limit: POINTS_PAGE_SIZE,
            rollup_id: filters.rollup_id.clone(),
            provider: filters.provider,
            cluster: filters.cluster.clone(),
            mode: filters.mode,
            outcome: filters.outcome,
            query: filters.query.trim().to_string(),
            node: filters.node.clone(),
            namespace: filters.namespace.clone(),
            scope: filters.scope,
            verification: filters.verification,
            window: TimeWindow::for_filters(filters, now, tz_offset_minutes),
        }
    }

    /// Filter parameters without paging (also used for facets)
    pub fn filter_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: &str| {
            if !value.is_empty() {
                pairs.push((key, value.to_string()));
            }
        };
        push("rollupId", &self.rollup_id);
        push("provider", self.provider.map(|p| p.as_str()).unwrap_or(""));
        push("cluster", &self.cluster);
        push("mode", self.mode.map(|m| m.as_str()).unwrap_or(""));
        push("outcome", self.outcome.map(|o| o.as_str()).unwrap_or(""));
        push("q", &self.query);
        push("node", &self.node);
        push("namespace", &self.namespace);
        if self.scope == Scope::Workload {
            push("scope", Scope::Workload.as_str());
        }
        push("verification", self.verification.map(|v| v.as_str()).unwrap_or(""));
        push("from", &format_instant(self.window.from));
        push("to", &format_instant(self.window.to));
        pairs
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        pairs.extend(self.filter_pairs());
        pairs
    }
}

/// One page of points as returned by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsPage {
    pub data: Vec<RecoveryPoint>,
    #[serde(default)]
    pub meta: PageMeta,
}

/// Page to show once the server reports `total_pages`: a page past the end
/// falls back to the last page; zero pages leaves the page alone
pub fn effective_page(current: u32, total_pages: u32) -> u32 {
    if total_pages > 0 && current > total_pages {
        total_pages
    } else {
        current.max(1)
    }
}

/// Server meta converted for `effective_page`
pub fn total_pages_of(meta: &PageMeta) -> u32 {
    meta.total_pages.clamp(0, u32::MAX as i64) as u32
}
