//! Health check handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckResult,
    pub snapshot: SnapshotStatus,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct SnapshotStatus {
    pub built: bool,
    pub digest_id: Option<i64>,
    pub stories: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: digest_common::VERSION,
    })
}

/// Readiness probe - store connectivity plus snapshot state.
///
/// A stale snapshot still serves, so only the store check gates readiness.
pub async fn ready(State(state): State<AppState>) -> Response {
    let start = std::time::Instant::now();

    let store_check = match state.store.ping().await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let snapshot = state.cache.snapshot();
    let snapshot_status = SnapshotStatus {
        built: snapshot.is_built(),
        digest_id: snapshot.digest_id(),
        stories: snapshot.stories().len(),
        refreshed_at: snapshot.refreshed_at().map(|ts| ts.to_rfc3339()),
    };

    let all_healthy = store_check.status == "up";
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            store: store_check,
            snapshot: snapshot_status,
        },
    };

    (status, Json(body)).into_response()
}

/// Prometheus exposition, 404 when metrics are disabled
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
