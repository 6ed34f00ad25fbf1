//! Per-request metrics middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use digest_common::metrics::RequestMetrics;

/// Record count and latency per route template (e.g. `/story/{id}`)
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}
