//! REST API handlers for the recovery backend

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RecoveryConfig;
use crate::recovery::{ListPointsOptions, Mode, Outcome, Provider, RecoveryPoint};
use crate::store::RecoveryStore;

/// Shared application state
pub struct AppState {
    pub store: Arc<RecoveryStore>,
    pub config: RecoveryConfig,
}

type Params = web::Query<HashMap<String, String>>;

// ─── Query parsing ───

/// First non-blank value among the given parameter aliases
fn param(query: &HashMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| query.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn bad_request(code: &str, error: String) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": error, "code": code }))
}

fn parse_time(query: &HashMap<String, String>, key: &str) -> Result<Option<DateTime<Utc>>, HttpResponse> {
    let raw = param(query, &[key]);
    if raw.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| bad_request(&format!("invalid_{}", key), format!("Invalid '{}' timestamp '{}': {}", key, raw, e)))
}

/// Parse an optional enum filter; unknown values are rejected
fn parse_enum<T>(query: &HashMap<String, String>, key: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>, HttpResponse> {
    let raw = param(query, &[key]);
    if raw.is_empty() {
        return Ok(None);
    }
    parse(&raw)
        .map(Some)
        .ok_or_else(|| bad_request(&format!("invalid_{}", key), format!("Unknown {} '{}'", key, raw)))
}

/// Translate request parameters into list options
pub fn parse_list_options(query: &HashMap<String, String>) -> Result<ListPointsOptions, HttpResponse> {
    let workload_only = param(query, &["scope"]).eq_ignore_ascii_case("workload")
        || truthy(&param(query, &["workloadOnly"]));

    Ok(ListPointsOptions {
        provider: parse_enum(query, "provider", Provider::parse)?,
        kind: param(query, &["kind"]),
        mode: parse_enum(query, "mode", Mode::parse)?,
        outcome: parse_enum(query, "outcome", Outcome::parse)?,
        subject_resource_id: param(query, &["subjectResourceId"]),
        rollup_id: param(query, &["rollupId"]),
        from: parse_time(query, "from")?,
        to: parse_time(query, "to")?,
        query: param(query, &["q", "query"]),
        cluster: param(query, &["cluster", "clusterLabel"]),
        node: param(query, &["node", "nodeHost", "nodeHostLabel"]),
        namespace: param(query, &["namespace", "namespaceLabel"]),
        workload_only,
        verification: param(query, &["verification", "verified"]).to_ascii_lowercase(),
        page: param(query, &["page"]).parse().unwrap_or(1),
        limit: param(query, &["limit"]).parse().unwrap_or(0),
    })
}

// ─── Recovery ───

/// GET /api/recovery/points: paged recovery points
pub async fn list_points(state: web::Data<AppState>, query: Params) -> HttpResponse {
    let opts = match parse_list_options(&query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let page = state.store.list_points(&opts);
    HttpResponse::Ok().json(serde_json::json!({ "data": page.items, "meta": page.meta }))
}

/// GET /api/recovery/rollups: latest status per protected subject
pub async fn list_rollups(state: web::Data<AppState>, query: Params) -> HttpResponse {
    let opts = match parse_list_options(&query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let page = state.store.list_rollups(&opts);
    HttpResponse::Ok().json(serde_json::json!({ "data": page.items, "meta": page.meta }))
}

/// GET /api/recovery/series: per-day counts in the viewer's timezone
pub async fn list_series(state: web::Data<AppState>, query: Params) -> HttpResponse {
    let opts = match parse_list_options(&query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let tz_offset = param(&query, &["tzOffsetMinutes"]).parse::<i32>().unwrap_or(0);
    let series = state.store.list_series(&opts, tz_offset);
    HttpResponse::Ok().json(serde_json::json!({ "data": series }))
}

/// GET /api/recovery/facets: dropdown values for the current filters
pub async fn list_facets(state: web::Data<AppState>, query: Params) -> HttpResponse {
    let opts = match parse_list_options(&query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(serde_json::json!({ "data": state.store.list_facets(&opts) }))
}

#[derive(Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub points: Vec<RecoveryPoint>,
}

/// POST /api/recovery/points: ingest a batch of points
pub async fn ingest_points(state: web::Data<AppState>, body: web::Json<IngestRequest>) -> HttpResponse {
    let mut points = body.into_inner().points;
    let max = state.config.max_ingest_points;
    if points.len() > max {
        warn!("Ingest batch of {} points truncated to {}", points.len(), max);
        points.truncate(max);
    }

    let store = state.store.clone();
    let result = web::block(move || store.upsert_points(points)).await;

    match result {
        Ok(Ok(stored)) => {
            debug!("Ingested {} recovery points", stored);
            HttpResponse::Ok().json(serde_json::json!({ "stored": stored }))
        }
        Ok(Err(e)) => {
            warn!("{}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": e, "code": "store_error" }))
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Internal error: {}", e),
            "code": "internal_error"
        })),
    }
}

/// GET /api/health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "points": state.store.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
        .route("/api/health", web::get().to(health))
        // Recovery
        .route("/api/recovery/points", web::get().to(list_points))
        .route("/api/recovery/points", web::post().to(ingest_points))
        .route("/api/recovery/rollups", web::get().to(list_rollups))
        .route("/api/recovery/series", web::get().to(list_series))
        .route("/api/recovery/facets", web::get().to(list_facets));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreSettings;
    use actix_web::{test as actix_test, App};

    fn state_with(points: Vec<RecoveryPoint>) -> web::Data<AppState> {
        let store = Arc::new(RecoveryStore::in_memory(StoreSettings::default()));
        store.upsert_points(points).unwrap();
        web::Data::new(AppState { store, config: RecoveryConfig { max_ingest_points: 2, ..Default::default() } })
    }

    fn point(id: &str, rid: &str, provider: Provider, completed: &str) -> RecoveryPoint {
        RecoveryPoint {
            id: id.into(),
            provider: Some(provider),
            kind: "backup".into(),
            outcome: Outcome::Success,
            subject_resource_id: rid.into(),
            completed_at: Some(completed.parse().unwrap()),
            ..Default::default()
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_aliases_and_scope() {
        let opts = parse_list_options(&query(&[
            ("query", "web"),
            ("clusterLabel", "prod"),
            ("nodeHost", "pve1"),
            ("namespaceLabel", "apps"),
            ("verified", "Verified"),
            ("scope", "workload"),
            ("page", "nope"),
            ("limit", "25"),
        ]))
        .unwrap();
        assert_eq!(opts.query, "web");
        assert_eq!(opts.cluster, "prod");
        assert_eq!(opts.node, "pve1");
        assert_eq!(opts.namespace, "apps");
        assert_eq!(opts.verification, "verified");
        assert!(opts.workload_only);
        assert_eq!(opts.page, 1);
        assert_eq!(opts.limit, 25);

        let opts = parse_list_options(&query(&[("workloadOnly", "yes"), ("q", "a"), ("query", "b")])).unwrap();
        assert!(opts.workload_only);
        assert_eq!(opts.query, "a");
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let resp = parse_list_options(&query(&[("from", "yesterday")])).unwrap_err();
        assert_eq!(resp.status(), 400);
        assert!(parse_list_options(&query(&[("provider", "tape-library")])).is_err());
        assert!(parse_list_options(&query(&[("to", "2024-01-01T00:00:00Z")])).unwrap().to.is_some());
    }

    #[actix_web::test]
    async fn test_points_endpoint_pages() {
        let state = state_with(vec![
            point("a", "vm-1", Provider::ProxmoxPve, "2024-01-01T00:00:00Z"),
            point("b", "vm-2", Provider::ProxmoxPve, "2024-01-02T00:00:00Z"),
            point("c", "ctr-1", Provider::Docker, "2024-01-03T00:00:00Z"),
        ]);
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/api/recovery/points?provider=proxmox-pve&limit=1").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0]["id"], "b");
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["meta"]["totalPages"], 2);
    }

    #[actix_web::test]
    async fn test_invalid_from_is_400_with_code() {
        let app = actix_test::init_service(App::new().app_data(state_with(vec![])).configure(configure)).await;
        let req = actix_test::TestRequest::get().uri("/api/recovery/rollups?from=garbage").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["code"], "invalid_from");
    }

    #[actix_web::test]
    async fn test_rollups_series_and_facets() {
        let state = state_with(vec![
            point("a", "vm-1", Provider::ProxmoxPve, "2024-01-01T10:00:00Z"),
            point("b", "vm-1", Provider::ProxmoxPve, "2024-01-02T10:00:00Z"),
        ]);
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/api/recovery/rollups").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["rollupId"], "res:vm-1");

        let req = actix_test::TestRequest::get()
            .uri("/api/recovery/series?from=2024-01-01T00:00:00Z&to=2024-01-02T23:00:00Z&tzOffsetMinutes=0")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][1]["local"], 1);

        let req = actix_test::TestRequest::get().uri("/api/recovery/facets").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["hasSize"], false);
    }

    #[actix_web::test]
    async fn test_ingest_truncates_batch() {
        let state = state_with(vec![]);
        let store = state.store.clone();
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let payload = serde_json::json!({ "points": [
            { "id": "p1", "provider": "docker", "kind": "backup", "outcome": "ok" },
            { "id": "p2", "provider": "docker", "kind": "backup" },
            { "id": "p3", "provider": "docker", "kind": "backup" }
        ]});
        let req = actix_test::TestRequest::post().uri("/api/recovery/points").set_json(&payload).to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stored"], 2);
        assert_eq!(store.len(), 2);

        let req = actix_test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["points"], 2);
    }

    #[actix_web::test]
    async fn test_ingest_write_failure_is_500_and_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = Arc::new(RecoveryStore::open(&data_dir.join("recovery.json"), StoreSettings::default()).unwrap());
        std::fs::remove_dir_all(&data_dir).unwrap();
        let state = web::Data::new(AppState { store: store.clone(), config: RecoveryConfig::default() });
        let app = actix_test::init_service(App::new().app_data(state).configure(configure)).await;

        let payload = serde_json::json!({ "points": [{ "id": "p1", "provider": "docker", "kind": "backup" }] });
        let req = actix_test::TestRequest::post().uri("/api/recovery/points").set_json(&payload).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["code"], "store_error");
        assert_eq!(store.len(), 0);
    }
}
