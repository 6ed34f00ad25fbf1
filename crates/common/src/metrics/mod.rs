//! Metrics and observability utilities
//!
//! Thin helpers over the `metrics` facade with consistent naming. Nothing
//! is recorded until a recorder (the Prometheus exporter in the gateway)
//! is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all digest service metrics
pub const METRICS_PREFIX: &str = "digest";

/// Histogram buckets for request and store latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for full snapshot rebuilds (many queries plus materialization)
pub const REFRESH_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00, 60.00];

fn name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(name("requests_total"), Unit::Count, "Total number of HTTP requests");
    describe_histogram!(
        name("request_duration_seconds"),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Store metrics
    describe_counter!(name("store_queries_total"), Unit::Count, "Row store queries by name and status");
    describe_histogram!(
        name("store_query_duration_seconds"),
        Unit::Seconds,
        "Row store query latency in seconds"
    );

    // Cache metrics
    describe_counter!(name("cache_hits_total"), Unit::Count, "Point lookups served from the snapshot");
    describe_counter!(name("cache_misses_total"), Unit::Count, "Point lookups that went to the store");

    // Refresh metrics
    describe_counter!(name("refreshes_total"), Unit::Count, "Snapshot rebuilds by trigger and status");
    describe_histogram!(
        name("refresh_duration_seconds"),
        Unit::Seconds,
        "Snapshot rebuild latency in seconds"
    );
    describe_gauge!(name("snapshot_stories"), Unit::Count, "Ranked stories in the current snapshot");
    describe_gauge!(name("snapshot_timelines"), Unit::Count, "Timelines in the current snapshot");

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            name("requests_total"),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            name("request_duration_seconds"),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

fn status_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

pub fn record_store_query(query: &'static str, duration_secs: f64, ok: bool) {
    counter!(
        name("store_queries_total"),
        "query" => query,
        "status" => status_label(ok)
    )
    .increment(1);

    histogram!(name("store_query_duration_seconds"), "query" => query).record(duration_secs);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, kind: &'static str) {
    if hit {
        counter!(name("cache_hits_total"), "kind" => kind).increment(1);
    } else {
        counter!(name("cache_misses_total"), "kind" => kind).increment(1);
    }
}

pub fn record_refresh(trigger: &'static str, duration_secs: f64, ok: bool) {
    counter!(
        name("refreshes_total"),
        "trigger" => trigger,
        "status" => status_label(ok)
    )
    .increment(1);

    if ok {
        histogram!(name("refresh_duration_seconds"), "trigger" => trigger).record(duration_secs);
    }
}

pub fn record_snapshot(stories: usize, timelines: usize) {
    gauge!(name("snapshot_stories")).set(stories as f64);
    gauge!(name("snapshot_timelines")).set(timelines as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, REFRESH_BUCKETS] {
            assert!(buckets.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        // No recorder installed: every helper is a no-op
        let metrics = RequestMetrics::start("GET", "/stories");
        metrics.finish(200);
        record_store_query("story_by_id", 0.01, true);
        record_cache(false, "story");
        record_refresh("explicit", 0.5, false);
        record_snapshot(3, 1);
    }

    #[test]
    fn test_prefixed_names() {
        assert_eq!(name("cache_hits_total"), "digest_cache_hits_total");
    }
}
