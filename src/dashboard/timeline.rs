//! Day-bucketed activity chart

use chrono::{DateTime, NaiveDate, Utc};

use super::filters::{ChartRange, FilterState, Scope, Verification};
use super::points::{format_instant, TimeWindow};
use crate::recovery::{Mode, Outcome, PointsSeriesBucket, Provider};

/// Series query: the point filters minus day and page, over the chart range
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
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
    /// Viewer offset, minutes east of UTC
    pub tz_offset_minutes: i32,
}

impl SeriesRequest {
    pub fn from_filters(filters: &FilterState, now: DateTime<Utc>, tz_offset_minutes: i32) -> Self {
        Self {
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
            window: TimeWindow::last_days(filters.range.days(), now, tz_offset_minutes),
            tz_offset_minutes,
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let optional = [
            ("rollupId", self.rollup_id.clone()),
            ("provider", self.provider.map(|p| p.as_str().to_string()).unwrap_or_default()),
            ("cluster", self.cluster.clone()),
            ("mode", self.mode.map(|m| m.as_str().to_string()).unwrap_or_default()),
            ("outcome", self.outcome.map(|o| o.as_str().to_string()).unwrap_or_default()),
            ("q", self.query.clone()),
            ("node", self.node.clone()),
            ("namespace", self.namespace.clone()),
            ("scope", if self.scope == Scope::Workload { "workload".to_string() } else { String::new() }),
            ("verification", self.verification.map(|v| v.as_str().to_string()).unwrap_or_default()),
        ];
        let mut pairs: Vec<_> = optional.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        pairs.push(("from", format_instant(self.window.from)));
        pairs.push(("to", format_instant(self.window.to)));
        pairs.push(("tzOffsetMinutes", self.tz_offset_minutes.to_string()));
        pairs
    }
}

// ─── Axis ───

/// Axis maximum and gridline step. The step is the smallest 1/2/5 x 10^n
/// value that is at least 1 and at least a fifth of `max`.
fn nice_axis(max: i64) -> (i64, i64) {
    if max <= 0 {
        return (1, 1);
    }
    let mut magnitude: i64 = 1;
    loop {
        for mult in [1, 2, 5] {
            let step = magnitude.saturating_mul(mult);
            if step.saturating_mul(5) >= max {
                let top = max.div_euclid(step) + i64::from(max.rem_euclid(step) != 0);
                return (top.saturating_mul(step), step);
            }
        }
        magnitude = magnitude.saturating_mul(10);
    }
}

/// Rounded chart ceiling; zero or negative input gives 1
pub fn nice_axis_max(max: i64) -> i64 {
    nice_axis(max).0
}

/// Gridline values from 0 to the axis maximum
pub fn axis_ticks(max: i64) -> Vec<i64> {
    let (top, step) = nice_axis(max);
    (0..=top / step).map(|i| i * step).collect()
}

// ─── Bars ───

/// Mode shares of one bar; they sum to 1 unless the bucket is empty
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarSegments {
    pub snapshot: f64,
    pub local: f64,
    pub remote: f64,
}

pub fn bar_segments(bucket: &PointsSeriesBucket) -> BarSegments {
    let parts = bucket.snapshot + bucket.local + bucket.remote;
    if parts == 0 {
        return BarSegments::default();
    }
    let total = parts as f64;
    BarSegments {
        snapshot: bucket.snapshot as f64 / total,
        local: bucket.local as f64 / total,
        remote: bucket.remote as f64 / total,
    }
}

/// Bar height as a fraction of the axis
pub fn bar_height(bucket: &PointsSeriesBucket, axis_max: i64) -> f64 {
    if axis_max <= 0 {
        return 0.0;
    }
    (bucket.total as f64 / axis_max as f64).clamp(0.0, 1.0)
}

/// Show every Nth label so they don't overlap
pub fn label_stride(range: ChartRange) -> usize {
    match range.days() {
        d if d <= 7 => 1,
        d if d <= 30 => 3,
        _ => 10,
    }
}

pub fn show_label(index: usize, len: usize, range: ChartRange) -> bool {
    index + 1 == len || index % label_stride(range) == 0
}

/// Clicking the selected bar clears the selection
pub fn toggle_day(selected: Option<NaiveDate>, clicked: NaiveDate) -> Option<NaiveDate> {
    if selected == Some(clicked) { None } else { Some(clicked) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBar {
    pub day: String,
    pub date: Option<NaiveDate>,
    pub total: u64,
    pub height: f64,
    pub segments: BarSegments,
    pub label: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub bars: Vec<TimelineBar>,
    pub axis_max: i64,
    pub ticks: Vec<i64>,
}

impl Timeline {
    pub fn build(buckets: &[PointsSeriesBucket], range: ChartRange, selected: Option<NaiveDate>) -> Self {
        let max = buckets.iter().map(|b| b.total).max().unwrap_or(0);
        let max = i64::try_from(max).unwrap_or(i64::MAX);
        let axis_max = nice_axis_max(max);

        let bars = buckets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let date = NaiveDate::parse_from_str(&b.day, "%Y-%m-%d").ok();
                let label = show_label(i, buckets.len(), range).then(|| match date {
                    Some(d) => d.format("%b %-d").to_string(),
                    None => b.day.clone(),
                });
                TimelineBar {
                    day: b.day.clone(),
                    date,
                    total: b.total,
                    height: bar_height(b, axis_max),
                    segments: bar_segments(b),
                    label,
                    selected: date.is_some() && date == selected,
                }
            })
            .collect();

        Self { bars, axis_max, ticks: axis_ticks(max) }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.iter().all(|b| b.total == 0)
    }
}
