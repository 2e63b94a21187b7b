//! Plain-text rendering of the Recovery view for `--report`

use chrono::{DateTime, Utc};

use super::client::QueryState;
use super::filters::RecoveryTab;
use super::grouping::DayGroup;
use super::rollups::{is_rollup_stale, never_succeeded, RollupsView};
use super::timeline::Timeline;
use super::view::RecoveryView;
use crate::recovery::{viewer_offset, Outcome, RecoveryPoint};

const MAX_ROLLUP_ROWS: usize = 25;
const BAR_WIDTH: f64 = 24.0;

fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}

fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{} B", bytes.max(0)) } else { format!("{:.1} {}", value, UNITS[unit]) }
}

/// Inline error line for a failed source, if any
fn error_line<T>(state: &QueryState<T>, source: &str) -> Option<String> {
    state.error.as_ref().map(|e| format!("  ! Failed to load {}: {}", source, e))
}

fn empty_hint(has_filters: bool, what: &str) -> String {
    if has_filters {
        format!("  No {} match the current filters. Clear filters to see everything.", what)
    } else {
        format!("  No {} yet. They appear once a provider reports backups.", what)
    }
}

fn render_summary(out: &mut Vec<String>, view: &RollupsView) {
    let c = &view.summary.counts;
    out.push(format!(
        "Protected items: {}  (success {}, warning {}, failed {}, running {}, unknown {})",
        view.summary.total, c.success, c.warning, c.failed, c.running, c.unknown
    ));
    out.push(format!(
        "Stale (no success in 7d): {}   Never succeeded: {}",
        view.summary.stale, view.summary.never_succeeded
    ));
}

fn render_rollups(out: &mut Vec<String>, rv: &RollupsView, now: DateTime<Utc>, tz_offset_minutes: i32) {
    let offset = viewer_offset(tz_offset_minutes);
    out.push(format!("{:<32} {:<24} {:<18} {:<8} {}", "SUBJECT", "SOURCE", "LAST BACKUP", "OUTCOME", "FLAGS"));
    for r in rv.rows.iter().take(MAX_ROLLUP_ROWS) {
        let sources: Vec<&str> = r.providers.iter().map(|p| p.label()).collect();
        let last = match r.last_attempt_at {
            Some(t) => format!("{} ({})", t.with_timezone(&offset).format("%m-%d %H:%M"), format_age(t, now)),
            None => "never".to_string(),
        };
        let mut flags = Vec::new();
        if is_rollup_stale(r, now) {
            flags.push("stale");
        }
        if never_succeeded(r) {
            flags.push("never-succeeded");
        }
        out.push(format!(
            "{:<32} {:<24} {:<18} {:<8} {}",
            r.subject_label(),
            sources.join(", "),
            last,
            r.last_outcome.as_str(),
            flags.join(" ")
        ));
    }
    if rv.rows.len() > MAX_ROLLUP_ROWS {
        out.push(format!("  ... {} more", rv.rows.len() - MAX_ROLLUP_ROWS));
    }
}

fn render_timeline(out: &mut Vec<String>, timeline: &Timeline) {
    out.push(format!("Activity (axis max {})", timeline.axis_max));
    for bar in &timeline.bars {
        let width = (bar.height * BAR_WIDTH).round() as usize;
        let marker = if bar.selected { '>' } else { ' ' };
        out.push(format!(
            "{}{:>7} |{:<24}| {}",
            marker,
            bar.label.as_deref().unwrap_or(""),
            "#".repeat(width),
            bar.total
        ));
    }
}

fn point_line(p: &RecoveryPoint, tz_offset_minutes: i32) -> String {
    let labels = p.labels();
    let when = p
        .timestamp()
        .map(|t| t.with_timezone(&viewer_offset(tz_offset_minutes)).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let source = p.provider.map(|pr| pr.label()).unwrap_or("unknown");
    let mut line = format!("    {}  {:<8} {:<32} {:<24} {}", when, p.outcome.as_str(), labels.subject_label, source, p.mode.as_str());
    if let Some(size) = p.size_bytes {
        line.push_str(&format!("  {}", format_bytes(size)));
    }
    if p.outcome == Outcome::Failed && !labels.details_summary.is_empty() {
        line.push_str(&format!("  [{}]", labels.details_summary));
    }
    line
}

fn render_groups(out: &mut Vec<String>, groups: &[DayGroup], tz_offset_minutes: i32) {
    for g in groups {
        out.push(format!("  {} ({})", g.label, g.points.len()));
        for p in &g.points {
            out.push(point_line(p, tz_offset_minutes));
        }
    }
}

/// Render the whole view as it currently stands
pub fn render_report(view: &RecoveryView, now: DateTime<Utc>) -> String {
    let filters = view.filters();
    let tz = view.tz_offset_minutes();
    let has_filters = filters.has_active_filters();
    let mut out = Vec::new();

    let query = filters.to_query_string();
    out.push(format!(
        "Recovery / {}  (last {} days{})",
        match filters.view {
            RecoveryTab::Protected => "Protected",
            RecoveryTab::Events => "Events",
        },
        filters.range.days(),
        if query.is_empty() { String::new() } else { format!(", {}", query) }
    ));
    out.push(String::new());

    let rv = view.rollups_view(now);
    match error_line(&view.rollups, "rollups") {
        Some(line) => out.push(line),
        None => render_summary(&mut out, &rv),
    }
    out.push(String::new());

    match filters.view {
        RecoveryTab::Protected => {
            if view.rollups.error.is_none() {
                if rv.rows.is_empty() {
                    out.push(empty_hint(has_filters, "protected items"));
                } else {
                    render_rollups(&mut out, &rv, now, tz);
                }
            }
        }
        RecoveryTab::Events => {
            match error_line(&view.series, "activity") {
                Some(line) => out.push(line),
                None => render_timeline(&mut out, &view.timeline()),
            }
            out.push(String::new());

            if let Some(line) = error_line(&view.points, "recovery points") {
                out.push(line);
            } else {
                let groups = view.point_groups(now);
                if groups.is_empty() {
                    out.push(empty_hint(has_filters, "recovery points"));
                } else {
                    render_groups(&mut out, &groups, tz);
                }
                if let Some(page) = &view.points.data {
                    out.push(format!(
                        "Page {} of {} ({} points)",
                        page.meta.page,
                        page.meta.total_pages.max(1),
                        page.meta.total
                    ));
                }
            }
        }
    }

    if let Some(line) = error_line(&view.facets, "facets") {
        out.push(line);
    }
    out.push(String::new());
    out.join("\n")
}
