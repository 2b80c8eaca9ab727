//! HTTP ingest and query surface, built on `axum` in the
//! `Router::new().route(...).with_state(...)` + `axum::serve` style.

pub mod error;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use error::IngestError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::network::types::State as ConnState;
use crate::store::{SlaResponse, Store, TickEntry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/offices", post(upsert_office).get(list_offices))
        .route("/ingest/state_change", post(ingest_state_change))
        .route("/ingest/tick", post(ingest_tick))
        .route("/sla", get(query_sla))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct OfficeUpsertRequest {
    name: String,
    gateway_ip: String,
    mx_ip: String,
    tunnel_probe_ip: String,
    #[serde(default = "default_retries_down")]
    retries_down: u32,
    #[serde(default = "default_retries_up")]
    retries_up: u32,
}

fn default_retries_down() -> u32 {
    2
}

fn default_retries_up() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct OfficeUpsertResponse {
    ok: bool,
    office_id: i64,
}

async fn upsert_office(
    State(state): State<AppState>,
    Json(req): Json<OfficeUpsertRequest>,
) -> Result<Json<OfficeUpsertResponse>, IngestError> {
    let office_id = state.store.upsert_office(
        &req.name,
        &req.gateway_ip,
        &req.mx_ip,
        &req.tunnel_probe_ip,
        req.retries_down,
        req.retries_up,
    )?;
    Ok(Json(OfficeUpsertResponse {
        ok: true,
        office_id,
    }))
}

async fn list_offices(State(state): State<AppState>) -> Result<Json<serde_json::Value>, IngestError> {
    let offices = state.store.list_offices()?;
    Ok(Json(serde_json::json!({ "offices": offices })))
}

#[derive(Debug, Deserialize)]
struct StateChangeSample {
    gateway: bool,
    mx: bool,
    ipsec: bool,
}

#[derive(Debug, Deserialize)]
struct StateChangeRequest {
    office: String,
    state: String,
    sample: StateChangeSample,
    at: i64,
}

#[derive(Debug, Serialize)]
struct StateChangeResponse {
    ok: bool,
    inserted: u64,
}

fn parse_state(raw: &str) -> Result<ConnState, IngestError> {
    match raw {
        "unknown" => Ok(ConnState::Unknown),
        "up" => Ok(ConnState::Up),
        "degraded" => Ok(ConnState::Degraded),
        "down" => Ok(ConnState::Down),
        other => Err(IngestError::BadRequest(format!("invalid state: {other}"))),
    }
}

async fn ingest_state_change(
    State(state): State<AppState>,
    Json(req): Json<StateChangeRequest>,
) -> Result<Json<StateChangeResponse>, IngestError> {
    let to_state = parse_state(&req.state)?;
    let inserted = state.store.ingest_state_change(
        &req.office,
        to_state,
        req.sample.gateway,
        req.sample.mx,
        req.sample.ipsec,
        req.at,
    )?;
    Ok(Json(StateChangeResponse { ok: true, inserted }))
}

/// One tick-batch entry. `state` is accepted but intentionally discarded —
/// the schema does not retain it (see DESIGN.md's open-question resolution).
#[derive(Debug, Deserialize)]
struct TickEntryRequest {
    office: String,
    gateway: bool,
    mx: bool,
    ipsec: bool,
    ts: i64,
    #[serde(default)]
    #[allow(dead_code)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct TickResponse {
    ok: bool,
    count: usize,
}

async fn ingest_tick(
    State(state): State<AppState>,
    Json(req): Json<Vec<TickEntryRequest>>,
) -> Result<Json<TickResponse>, IngestError> {
    let entries: Vec<TickEntry> = req
        .into_iter()
        .map(|e| TickEntry {
            office: e.office,
            gateway: e.gateway,
            mx: e.mx,
            ipsec: e.ipsec,
            ts: e.ts,
        })
        .collect();
    let count = state.store.ingest_tick_batch(&entries)?;
    Ok(Json(TickResponse { ok: true, count }))
}

#[derive(Debug, Deserialize)]
struct SlaQueryParams {
    office: Option<String>,
    t_start: Option<i64>,
    t_end: Option<i64>,
}

async fn query_sla(
    State(state): State<AppState>,
    Query(params): Query<SlaQueryParams>,
) -> Result<Json<SlaResponse>, IngestError> {
    let t_end = params.t_end.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let t_start = params.t_start.unwrap_or(t_end - 86_400);
    let response = state.store.query_sla(params.office.as_deref(), t_start, t_end)?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(Store::open_in_memory().unwrap()),
        }
    }

    /// Scenario 3: posting a state change for an unregistered office
    /// returns 400 with the literal substring "Unknown office".
    #[tokio::test]
    async fn scenario_three_unknown_office_returns_400() {
        let app = router(test_state());
        let body = serde_json::json!({
            "office": "ghost",
            "state": "up",
            "sample": {"gateway": true, "mx": true, "ipsec": true},
            "at": 1,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest/state_change")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Unknown office"));
    }

    #[tokio::test]
    async fn upsert_then_query_round_trips() {
        let app = router(test_state());
        let body = serde_json::json!({
            "name": "hq",
            "gateway_ip": "10.0.0.1",
            "mx_ip": "10.0.0.2",
            "tunnel_probe_ip": "10.0.0.3",
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/offices")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/sla?office=hq&t_start=0&t_end=100")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
