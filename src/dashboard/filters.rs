//! Recovery page filter state and its URL representation

use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

use super::links::{QueryBuilder, QueryParams, RecoveryLinkParams, RECOVERY_PATH};
use crate::recovery::{Mode, Outcome, Provider};

// ─── Field types ───

/// Which half of the Recovery page is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryTab {
    #[default]
    Protected,
    Events,
}

impl RecoveryTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protected => "protected",
            Self::Events => "events",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "protected" => Some(Self::Protected),
            "events" => Some(Self::Events),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Workload,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Workload => "workload",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "workload" | "workloads" => Some(Self::Workload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Unverified,
    Unknown,
}

impl Verification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unverified => "unverified",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "verified" => Some(Self::Verified),
            "unverified" => Some(Self::Unverified),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Timeline window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartRange {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl ChartRange {
    pub const ALL: [ChartRange; 4] = [Self::Week, Self::Month, Self::Quarter, Self::Year];

    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    pub fn from_days(days: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.days() == days)
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

// ─── Filter state ───

/// Every user-controlled input of the Recovery page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub view: RecoveryTab,
    pub rollup_id: String,
    pub query: String,
    pub provider: Option<Provider>,
    pub cluster: String,
    pub mode: Option<Mode>,
    pub outcome: Option<Outcome>,
    pub verification: Option<Verification>,
    pub scope: Scope,
    pub node: String,
    pub namespace: String,
    pub range: ChartRange,
    pub day: Option<NaiveDate>,
    pub page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            view: RecoveryTab::default(),
            rollup_id: String::new(),
            query: String::new(),
            provider: None,
            cluster: String::new(),
            mode: None,
            outcome: None,
            verification: None,
            scope: Scope::default(),
            node: String::new(),
            namespace: String::new(),
            range: ChartRange::default(),
            day: None,
            page: 1,
        }
    }
}

impl FilterState {
    pub fn set_view(&mut self, view: RecoveryTab) {
        self.view = view;
        self.page = 1;
    }

    pub fn set_rollup_id(&mut self, rollup_id: &str) {
        self.rollup_id = rollup_id.trim().to_string();
        self.page = 1;
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
        self.page = 1;
    }

    pub fn set_provider(&mut self, provider: Option<Provider>) {
        self.provider = provider;
        self.page = 1;
    }

    pub fn set_cluster(&mut self, cluster: &str) {
        self.cluster = cluster.trim().to_string();
        self.page = 1;
    }

    pub fn set_mode(&mut self, mode: Option<Mode>) {
        self.mode = mode;
        self.page = 1;
    }

    pub fn set_outcome(&mut self, outcome: Option<Outcome>) {
        self.outcome = outcome;
        self.page = 1;
    }

    pub fn set_verification(&mut self, verification: Option<Verification>) {
        self.verification = verification;
        self.page = 1;
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
        self.page = 1;
    }

    pub fn set_node(&mut self, node: &str) {
        self.node = node.trim().to_string();
        self.page = 1;
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.trim().to_string();
        self.page = 1;
    }

    pub fn set_range(&mut self, range: ChartRange) {
        self.range = range;
        self.page = 1;
    }

    pub fn set_day(&mut self, day: Option<NaiveDate>) {
        self.day = day;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Reset every filter; view and chart range survive
    pub fn clear(&mut self) {
        *self = Self { view: self.view, range: self.range, ..Self::default() };
    }

    /// Pull the page back when the result set shrank under it.
    /// Returns true when the page changed.
    pub fn clamp_page(&mut self, total_pages: u32) -> bool {
        let page = super::points::effective_page(self.page, total_pages);
        let changed = page != self.page;
        self.page = page;
        changed
    }

    /// Whether any narrowing filter is active (for the clear-filters hint)
    pub fn has_active_filters(&self) -> bool {
        *self != Self { view: self.view, range: self.range, page: self.page, ..Self::default() }
    }

    fn link_params(&self) -> RecoveryLinkParams {
        RecoveryLinkParams {
            view: match self.view {
                RecoveryTab::Protected => String::new(),
                v => v.as_str().to_string(),
            },
            rollup_id: self.rollup_id.clone(),
            provider: self.provider.map(|p| p.as_str().to_string()).unwrap_or_default(),
            cluster: self.cluster.clone(),
            namespace: self.namespace.clone(),
            mode: self.mode.map(|m| m.as_str().to_string()).unwrap_or_default(),
            scope: match self.scope {
                Scope::All => String::new(),
                s => s.as_str().to_string(),
            },
            status: self.outcome.map(|o| o.as_str().to_string()).unwrap_or_default(),
            verification: self.verification.map(|v| v.as_str().to_string()).unwrap_or_default(),
            node: self.node.clone(),
            query: self.query.clone(),
        }
    }

    /// Serialize to a query string (no leading `?`); defaults are omitted
    pub fn to_query_string(&self) -> String {
        let mut qb = QueryBuilder::new();
        self.link_params().push_into(&mut qb);
        if self.range != ChartRange::default() {
            qb.push("range", &self.range.days().to_string());
        }
        if let Some(day) = self.day {
            qb.push("day", &day.format("%Y-%m-%d").to_string());
        }
        if self.page > 1 {
            qb.push("page", &self.page.to_string());
        }
        qb.query_string()
    }

    /// Inverse of `to_query_string`. Unknown or malformed values fall back
    /// to their defaults.
    pub fn from_query_string(search: &str) -> Self {
        let q = QueryParams::parse(search);
        let link = RecoveryLinkParams::from_params(&q);

        Self {
            view: RecoveryTab::parse(&link.view).unwrap_or_default(),
            rollup_id: link.rollup_id,
            query: link.query,
            provider: Provider::parse(&link.provider),
            cluster: link.cluster,
            mode: Mode::parse(&link.mode),
            outcome: Outcome::parse(&link.status),
            verification: Verification::parse(&link.verification),
            scope: Scope::parse(&link.scope).unwrap_or_default(),
            node: link.node,
            namespace: link.namespace,
            range: q.get(&["range"]).parse().ok().and_then(ChartRange::from_days).unwrap_or_default(),
            day: NaiveDate::parse_from_str(&q.get(&["day"]), "%Y-%m-%d").ok(),
            page: q.get(&["page"]).parse::<u32>().ok().filter(|p| *p >= 1).unwrap_or(1),
        }
    }

    /// Recovery page URL for this state
    pub fn to_url(&self) -> String {
        let qs = self.to_query_string();
        if qs.is_empty() {
            RECOVERY_PATH.to_string()
        } else {
            format!("{}?{}", RECOVERY_PATH, qs)
        }
    }
}

// ─── URL sync ───

/// Router seam. Filter changes replace the current history entry.
pub trait Navigator: Send {
    fn replace(&mut self, url: &str);
}

/// Navigator that only remembers the last URL (headless use and tests)
#[derive(Debug, Default, Clone)]
pub struct MemoryNavigator {
    pub current: String,
    pub replacements: usize,
}

impl Navigator for MemoryNavigator {
    fn replace(&mut self, url: &str) {
        self.current = url.to_string();
        self.replacements += 1;
    }
}

/// Owns the filter state and writes it back to the URL after each change
pub struct FilterStore {
    state: FilterState,
    navigator: Box<dyn Navigator>,
    last_url: String,
}

impl FilterStore {
    /// Restore state from the URL the page was opened with
    pub fn from_url(search: &str, navigator: Box<dyn Navigator>) -> Self {
        let state = FilterState::from_query_string(search);
        let last_url = state.to_url();
        Self { state, navigator, last_url }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Apply a mutation and sync the URL if it changed
    pub fn update(&mut self, mutate: impl FnOnce(&mut FilterState)) {
        mutate(&mut self.state);
        self.sync();
    }

    /// Pull the page back into range; true when it moved
    pub fn clamp_page(&mut self, total_pages: u32) -> bool {
        if !self.state.clamp_page(total_pages) {
            return false;
        }
        debug!("Clamped recovery page to {}", self.state.page);
        self.sync();
        true
    }

    fn sync(&mut self) {
        let url = self.state.to_url();
        if url != self.last_url {
            self.navigator.replace(&url);
            self.last_url = url;
        }
    }
}
