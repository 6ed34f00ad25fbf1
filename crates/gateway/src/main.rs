//! Digest API Gateway
//!
//! Serves the cached digest snapshot over HTTP.
//! Handles:
//! - Snapshot construction and the background refresh schedule
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod routes;

use digest_common::{
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics::{self, LATENCY_BUCKETS, REFRESH_BUCKETS},
    DigestCache, Materializer, RefreshScheduler, Repository, RowStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);

    info!("Starting Digest API Gateway v{}", digest_common::VERSION);

    // Initialize metrics
    let metrics_handle = if config.observability.metrics_enabled {
        let handle = install_metrics()?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    // Row store (connects lazily on first query)
    let store: Arc<dyn RowStore> = Arc::new(DbPool::new(&config.database)?);

    // Snapshot cache and its refresh schedule
    let cache = Arc::new(DigestCache::new(
        Repository::new(Arc::clone(&store)),
        Materializer::default(),
    ));
    let refresh = Arc::new(RefreshScheduler::new(Arc::clone(&cache), &config.refresh).spawn());

    // Create app state
    let state = AppState {
        config: Arc::clone(&config),
        cache,
        store,
        refresh: Arc::clone(&refresh),
        metrics: metrics_handle,
    };

    // Build the router
    let app = routes::create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("request_duration_seconds".to_string()), LATENCY_BUCKETS)?
        .set_buckets_for_metric(Matcher::Suffix("store_query_duration_seconds".to_string()), LATENCY_BUCKETS)?
        .set_buckets_for_metric(Matcher::Suffix("refresh_duration_seconds".to_string()), REFRESH_BUCKETS)?
        .install_recorder()?;
    Ok(handle)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
