//! HTTP client for the recovery endpoints, plus per-query state tracking

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::points::{PointsPage, PointsRequest};
use super::rollups::RollupsRequest;
use super::timeline::SeriesRequest;
use crate::recovery::{PageMeta, PointsFacets, PointsSeriesBucket, ProtectionRollup};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Page size used when walking every rollup page
const ROLLUP_PAGE_LIMIT: u32 = 500;
const MAX_ROLLUP_PAGES: u32 = 50;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Prefer the server's `{ "error": ... }` text over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() { "request failed".to_string() } else { trimmed.to_string() }
        })
}

pub struct RecoveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecoveryClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, pairs: &[(&'static str, String)]) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} ({} params)", url, pairs.len());
        let resp = self.http.get(&url).query(pairs).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), message: error_message(&body) });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// One page of rollups
    pub async fn rollups(&self, req: &RollupsRequest, page: u32, limit: u32) -> Result<(Vec<ProtectionRollup>, PageMeta), FetchError> {
        let mut pairs = req.to_query_pairs();
        pairs.push(("page", page.to_string()));
        pairs.push(("limit", limit.to_string()));
        let env: ListEnvelope<ProtectionRollup> = self.get_json("/api/recovery/rollups", &pairs).await?;
        Ok((env.data, env.meta))
    }

    /// Every rollup matching the request, following pages
    pub async fn all_rollups(&self, req: &RollupsRequest) -> Result<Vec<ProtectionRollup>, FetchError> {
        let (all, truncated) = self.walk_rollups(req, ROLLUP_PAGE_LIMIT, MAX_ROLLUP_PAGES).await?;
        if truncated {
            warn!(
                "Stopped after {} rollup pages ({} rollups); summary counts exclude the rest",
                MAX_ROLLUP_PAGES,
                all.len()
            );
        }
        Ok(all)
    }

    /// Follow rollup pages up to `max_pages`. The flag is true when pages
    /// were left unread.
    async fn walk_rollups(
        &self,
        req: &RollupsRequest,
        limit: u32,
        max_pages: u32,
    ) -> Result<(Vec<ProtectionRollup>, bool), FetchError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let (data, meta) = self.rollups(req, page, limit).await?;
            let last = data.is_empty() || meta.total_pages <= i64::from(page);
            all.extend(data);
            if last {
                return Ok((all, false));
            }
            if page >= max_pages {
                return Ok((all, true));
            }
            page += 1;
        }
    }

    pub async fn points(&self, req: &PointsRequest) -> Result<PointsPage, FetchError> {
        self.get_json("/api/recovery/points", &req.to_query_pairs()).await
    }

    pub async fn series(&self, req: &SeriesRequest) -> Result<Vec<PointsSeriesBucket>, FetchError> {
        let env: DataEnvelope<Vec<PointsSeriesBucket>> = self.get_json("/api/recovery/series", &req.to_query_pairs()).await?;
        Ok(env.data)
    }

    /// Facets for the point filters (paging ignored)
    pub async fn facets(&self, req: &PointsRequest) -> Result<PointsFacets, FetchError> {
        let env: DataEnvelope<PointsFacets> = self.get_json("/api/recovery/facets", &req.filter_pairs()).await?;
        Ok(env.data)
    }
}

// ─── Query state ───

/// Loading / error / data for one data source
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self { loading: false, error: None, data: None }
    }
}

impl<T> QueryState<T> {
    pub fn begin(&mut self) {
        self.loading = true;
    }

    /// Record a result. Returns the error text when it failed. Data from
    /// the last success is kept so the panel can still show it.
    pub fn resolve(&mut self, result: Result<T, FetchError>) -> Option<String> {
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                None
            }
            Err(e) => {
                let message = e.to_string();
                self.error = Some(message.clone());
                Some(message)
            }
        }
    }
}

// ─── Generations ───

/// Identifies one refresh; only the latest one may apply its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Generation {
    current: u64,
}

impl Generation {
    pub fn next(&mut self) -> Ticket {
        self.current += 1;
        Ticket(self.current)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }

    pub fn current(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::spawn_server;
    use crate::dashboard::filters::FilterState;
    use chrono::{DateTime, Utc};

    #[test]
    fn test_error_message_prefers_json_error() {
        assert_eq!(error_message(r#"{"error":"Invalid 'from'","code":"invalid_from"}"#), "Invalid 'from'");
        assert_eq!(error_message("  upstream down \n"), "upstream down");
        assert_eq!(error_message(""), "request failed");
    }

    #[test]
    fn test_query_state_keeps_data_on_error() {
        let mut state: QueryState<u32> = QueryState::default();
        state.begin();
        assert!(state.loading);
        assert_eq!(state.resolve(Ok(7)), None);
        let err = state.resolve(Err(FetchError::Status { status: 500, message: "boom".into() }));
        assert_eq!(err.as_deref(), Some("HTTP 500: boom"));
        assert!(!state.loading);
        assert_eq!(state.data, Some(7));
    }

    #[test]
    fn test_generation_tickets() {
        let mut generation = Generation::default();
        let first = generation.next();
        assert!(generation.is_current(first));
        let second = generation.next();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        assert_eq!(second.id(), 2);
    }

    #[actix_web::test]
    async fn test_client_against_live_server() {
        let anchor: DateTime<Utc> = "2024-06-15T00:00:00Z".parse().unwrap();
        let (base, handle) = spawn_server(crate::mock::generate(anchor)).await;
        let client = RecoveryClient::new(&base).unwrap();
        let now = anchor + chrono::Duration::hours(12);
        let filters = FilterState::default();

        let rollups = client.all_rollups(&RollupsRequest::from_filters(&filters)).await.unwrap();
        assert!(!rollups.is_empty());

        let (page, meta) = client.rollups(&RollupsRequest::default(), 1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(meta.total, rollups.len() as i64);

        let req = PointsRequest::from_filters(&filters, now, 0);
        let points = client.points(&req).await.unwrap();
        assert!(!points.data.is_empty());
        assert_eq!(points.meta.limit, 200);

        let series = client
            .series(&SeriesRequest::from_filters(&filters, now, 0))
            .await
            .unwrap();
        assert_eq!(series.len(), 30);

        let facets = client.facets(&req).await.unwrap();
        assert!(facets.clusters.contains(&"prod-cluster".to_string()));

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_rollup_walk_flags_page_cap() {
        let anchor: DateTime<Utc> = "2024-06-15T00:00:00Z".parse().unwrap();
        let (base, handle) = spawn_server(crate::mock::generate(anchor)).await;
        let client = RecoveryClient::new(&base).unwrap();
        let req = RollupsRequest::from_filters(&FilterState::default());

        let (everything, truncated) = client.walk_rollups(&req, 500, 50).await.unwrap();
        assert!(!truncated);
        assert!(everything.len() > 4);

        let (capped, truncated) = client.walk_rollups(&req, 2, 2).await.unwrap();
        assert!(truncated);
        assert_eq!(capped.len(), 4);

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_client_reports_http_errors() {
        let (base, handle) = spawn_server(Vec::new()).await;
        let client = RecoveryClient::new(&format!("{}/missing", base)).unwrap();
        let err = client.series(&SeriesRequest::from_filters(&FilterState::default(), Utc::now(), 0)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        handle.stop(true).await;
    }
}
