//! Router construction and shared state

use crate::handlers;
use crate::middleware;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use digest_common::{config::AppConfig, DigestCache, RefreshHandle, RowStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<DigestCache>,
    pub store: Arc<dyn RowStore>,
    pub refresh: Arc<RefreshHandle>,
    /// Present when the metrics endpoint is enabled
    pub metrics: Option<PrometheusHandle>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS: any origin, method and header, no credentials
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))

        // Read endpoints
        .route("/stories", get(handlers::stories::list_stories))
        .route("/story/{id}", get(handlers::stories::get_story))
        .route("/timeline/{id}", get(handlers::timelines::get_timeline))
        .route("/digest/{id}", get(handlers::digests::get_digest))
        .route("/latest_digest", get(handlers::digests::latest_digest))

        // Explicit rebuild
        .route("/refresh", post(handlers::refresh::refresh))

        .layer(from_fn(middleware::metrics::track_requests))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}
