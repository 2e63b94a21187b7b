//! Recovery view store: filters, the four data sources and the derived
//! panels, with refreshes tagged so a slow response cannot overwrite a
//! newer one

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

use super::client::{FetchError, Generation, QueryState, RecoveryClient, Ticket};
use super::filters::{FilterState, FilterStore, Navigator};
use super::grouping::{group_points_by_day, DayGroup};
use super::notify::{Notification, Notifier};
use super::points::{total_pages_of, PointsPage, PointsRequest};
use super::rollups::{RollupColumn, RollupSort, RollupsRequest, RollupsView};
use super::timeline::{toggle_day, SeriesRequest, Timeline};
use crate::recovery::{PointsFacets, PointsSeriesBucket, ProtectionRollup};

/// Requests for one refresh, built from the filters at the time it began
#[derive(Debug, Clone)]
pub struct RefreshPlan {
    pub ticket: Ticket,
    pub rollups: RollupsRequest,
    pub points: PointsRequest,
    pub series: SeriesRequest,
}

/// Raw outcome of every query in a refresh
#[derive(Debug)]
pub struct RefreshResult {
    pub ticket: Ticket,
    pub rollups: Result<Vec<ProtectionRollup>, FetchError>,
    pub points: Result<PointsPage, FetchError>,
    pub series: Result<Vec<PointsSeriesBucket>, FetchError>,
    pub facets: Result<PointsFacets, FetchError>,
}

pub struct RecoveryView {
    filters: FilterStore,
    pub rollups: QueryState<Vec<ProtectionRollup>>,
    pub points: QueryState<PointsPage>,
    pub series: QueryState<Vec<PointsSeriesBucket>>,
    pub facets: QueryState<PointsFacets>,
    rollup_sort: RollupSort,
    stale_only: bool,
    tz_offset_minutes: i32,
    notifier: Arc<dyn Notifier>,
    generation: Generation,
}

impl RecoveryView {
    pub fn new(search: &str, navigator: Box<dyn Navigator>, notifier: Arc<dyn Notifier>, tz_offset_minutes: i32) -> Self {
        Self {
            filters: FilterStore::from_url(search, navigator),
            rollups: QueryState::default(),
            points: QueryState::default(),
            series: QueryState::default(),
            facets: QueryState::default(),
            rollup_sort: RollupSort::default(),
            stale_only: false,
            tz_offset_minutes,
            notifier,
            generation: Generation::default(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.filters.state()
    }

    pub fn update_filters(&mut self, mutate: impl FnOnce(&mut FilterState)) {
        self.filters.update(mutate);
    }

    /// Chart bar click
    pub fn selected_day_toggle(&mut self, day: NaiveDate) {
        let next = toggle_day(self.filters().day, day);
        self.filters.update(|f| f.set_day(next));
    }

    pub fn rollup_sort(&self) -> RollupSort {
        self.rollup_sort
    }

    pub fn toggle_sort(&mut self, column: RollupColumn) {
        self.rollup_sort.toggle(column);
    }

    pub fn stale_only(&self) -> bool {
        self.stale_only
    }

    pub fn set_stale_only(&mut self, stale_only: bool) {
        self.stale_only = stale_only;
    }

    pub fn tz_offset_minutes(&self) -> i32 {
        self.tz_offset_minutes
    }

    // ─── Refresh ───

    /// Take a new ticket and mark every source as loading
    pub fn begin_refresh(&mut self, now: DateTime<Utc>) -> RefreshPlan {
        let ticket = self.generation.next();
        self.rollups.begin();
        self.points.begin();
        self.series.begin();
        self.facets.begin();
        let filters = self.filters.state();
        RefreshPlan {
            ticket,
            rollups: RollupsRequest::from_filters(filters),
            points: PointsRequest::from_filters(filters, now, self.tz_offset_minutes),
            series: SeriesRequest::from_filters(filters, now, self.tz_offset_minutes),
        }
    }

    /// Run all four queries concurrently
    pub async fn fetch(plan: &RefreshPlan, client: &RecoveryClient) -> RefreshResult {
        let (rollups, points, series, facets) = tokio::join!(
            client.all_rollups(&plan.rollups),
            client.points(&plan.points),
            client.series(&plan.series),
            client.facets(&plan.points),
        );
        RefreshResult { ticket: plan.ticket, rollups, points, series, facets }
    }

    /// Store a refresh's results unless a newer refresh has started.
    /// Returns true when the points meta pulled the page back into range.
    pub fn apply(&mut self, result: RefreshResult) -> bool {
        if !self.generation.is_current(result.ticket) {
            debug!(
                "Dropping stale recovery responses (ticket {}, current {})",
                result.ticket.id(),
                self.generation.current()
            );
            return false;
        }

        let failures = [
            ("rollups", self.rollups.resolve(result.rollups)),
            ("recovery points", self.points.resolve(result.points)),
            ("activity", self.series.resolve(result.series)),
            ("facets", self.facets.resolve(result.facets)),
        ];
        for (source, failure) in failures {
            if let Some(message) = failure {
                self.notifier.notify(Notification::error(format!("Failed to load {}", source), message));
            }
        }

        match (&self.points.error, &self.points.data) {
            (None, Some(page)) => {
                let total_pages = total_pages_of(&page.meta);
                self.filters.clamp_page(total_pages)
            }
            _ => false,
        }
    }

    /// Fetch everything for the current filters. A clamped page triggers
    /// one follow-up refresh for the corrected page.
    pub async fn refresh(&mut self, client: &RecoveryClient, now: DateTime<Utc>) {
        let plan = self.begin_refresh(now);
        let result = Self::fetch(&plan, client).await;
        if self.apply(result) {
            let plan = self.begin_refresh(now);
            let result = Self::fetch(&plan, client).await;
            self.apply(result);
        }
    }

    // ─── Derived ───

    pub fn rollups_view(&self, now: DateTime<Utc>) -> RollupsView {
        let rollups = self.rollups.data.as_deref().unwrap_or(&[]);
        RollupsView::compute(rollups, self.filters(), self.rollup_sort, self.stale_only, now)
    }

    pub fn timeline(&self) -> Timeline {
        let buckets = self.series.data.as_deref().unwrap_or(&[]);
        let filters = self.filters();
        Timeline::build(buckets, filters.range, filters.day)
    }

    pub fn point_groups(&self, now: DateTime<Utc>) -> Vec<DayGroup> {
        let points = self.points.data.as_ref().map(|p| p.data.as_slice()).unwrap_or(&[]);
        group_points_by_day(points, now, self.tz_offset_minutes)
    }
}
