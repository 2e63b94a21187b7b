//! Events list: local sort and day grouping of a fetched page of points

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

use crate::recovery::{day_key, valid_time, viewer_offset, RecoveryPoint};

/// Group key for points without any timestamp
pub const UNKNOWN_DAY: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub key: String,
    pub label: String,
    /// Today or yesterday
    pub recent: bool,
    pub points: Vec<RecoveryPoint>,
}

fn event_time(p: &RecoveryPoint) -> Option<DateTime<Utc>> {
    valid_time(p.completed_at).or_else(|| valid_time(p.started_at))
}

/// Newest first (completion, else start, else the epoch), then subject
/// label ascending
pub fn sort_points_for_display(points: &mut [RecoveryPoint]) {
    let mut keyed: Vec<(i64, String, RecoveryPoint)> = points
        .iter()
        .map(|p| {
            let ms = event_time(p).map(|t| t.timestamp_millis()).unwrap_or(0);
            (ms, p.labels().subject_label.to_lowercase(), p.clone())
        })
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    for (slot, (_, _, p)) in points.iter_mut().zip(keyed) {
        *slot = p;
    }
}

/// "Today", "Yesterday" or a full date; the flag marks the first two
pub fn day_label(key: &str, now: DateTime<Utc>, tz_offset_minutes: i32) -> (String, bool) {
    if key == UNKNOWN_DAY {
        return ("Unknown date".to_string(), false);
    }
    let offset = viewer_offset(tz_offset_minutes);
    if key == day_key(now, offset) {
        return ("Today".to_string(), true);
    }
    if key == day_key(now - Duration::days(1), offset) {
        return ("Yesterday".to_string(), true);
    }
    match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        Ok(d) => (d.format("%A, %B %-d, %Y").to_string(), false),
        Err(_) => (key.to_string(), false),
    }
}

/// Sort the page then bucket it by local calendar day. Groups appear in
/// first-seen order of the sorted stream.
pub fn group_points_by_day(points: &[RecoveryPoint], now: DateTime<Utc>, tz_offset_minutes: i32) -> Vec<DayGroup> {
    let offset = viewer_offset(tz_offset_minutes);
    let mut sorted = points.to_vec();
    sort_points_for_display(&mut sorted);

    let mut groups: Vec<DayGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for p in sorted {
        let key = event_time(&p)
            .map(|t| day_key(t, offset))
            .unwrap_or_else(|| UNKNOWN_DAY.to_string());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            let (label, recent) = day_label(&key, now, tz_offset_minutes);
            groups.push(DayGroup { key: key.clone(), label, recent, points: Vec::new() });
            groups.len() - 1
        });
        groups[slot].points.push(p);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::Provider;

    fn point(id: &str, completed: Option<&str>) -> RecoveryPoint {
        RecoveryPoint {
            id: id.into(),
            provider: Some(Provider::Docker),
            kind: "backup".into(),
            subject_resource_id: format!("subject-{}", id),
            completed_at: completed.map(|s| s.parse().unwrap()),
            ..Default::default()
        }
    }

    fn ids(points: &[RecoveryPoint]) -> Vec<&str> {
        points.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_groups_by_utc_day() {
        let points = vec![
            point("a", Some("2024-01-01T10:00:00Z")),
            point("b", Some("2024-01-01T23:00:00Z")),
            point("c", Some("2024-01-02T01:00:00Z")),
        ];
        let now = "2024-03-01T00:00:00Z".parse().unwrap();
        let groups = group_points_by_day(&points, now, 0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "2024-01-02");
        assert_eq!(ids(&groups[0].points), vec!["c"]);
        assert_eq!(groups[1].key, "2024-01-01");
        assert_eq!(ids(&groups[1].points), vec!["b", "a"]);
        assert_eq!(groups[1].label, "Monday, January 1, 2024");
        assert!(!groups[1].recent);
    }

    #[test]
    fn test_viewer_offset_moves_day_boundary() {
        let points = vec![point("late", Some("2024-01-01T23:00:00Z"))];
        let now = "2024-03-01T00:00:00Z".parse().unwrap();
        assert_eq!(group_points_by_day(&points, now, 120)[0].key, "2024-01-02");
        assert_eq!(group_points_by_day(&points, now, -60)[0].key, "2024-01-01");
    }

    #[test]
    fn test_today_yesterday_and_unknown() {
        let now: DateTime<Utc> = "2024-01-02T12:00:00Z".parse().unwrap();
        let mut started_only = point("s", None);
        started_only.started_at = Some("2024-01-01T08:00:00Z".parse().unwrap());
        let points = vec![point("none", None), started_only, point("t", Some("2024-01-02T09:00:00Z"))];

        let groups = group_points_by_day(&points, now, 0);
        let labels: Vec<_> = groups.iter().map(|g| (g.label.as_str(), g.recent)).collect();
        assert_eq!(labels, vec![("Today", true), ("Yesterday", true), ("Unknown date", false)]);
        assert_eq!(groups[2].key, UNKNOWN_DAY);
    }

    #[test]
    fn test_ties_sorted_by_subject_label() {
        let mut b = point("1", Some("2024-01-01T10:00:00Z"));
        b.subject_resource_id = "Beta".into();
        let mut a = point("2", Some("2024-01-01T10:00:00Z"));
        a.subject_resource_id = "alpha".into();
        let mut points = vec![b, a];
        sort_points_for_display(&mut points);
        assert_eq!(ids(&points), vec!["2", "1"]);
    }
}
