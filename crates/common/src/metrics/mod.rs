//! Metrics and observability utilities
//!
//! Metric names share the `citetree_` prefix. Without an installed recorder
//! every call here is a no-op, so library users pay nothing unless they opt in.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all citetree metrics
pub const METRICS_PREFIX: &str = "citetree";

/// Register all metric descriptions
pub fn register_metrics() {
    // Crawl metrics
    describe_counter!(
        format!("{}_relations_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Citations/references listings requested upstream"
    );

    describe_counter!(
        format!("{}_relation_cache_total", METRICS_PREFIX),
        Unit::Count,
        "Node expansions answered from the store (hit) or upstream (miss)"
    );

    describe_counter!(
        format!("{}_edges_written_total", METRICS_PREFIX),
        Unit::Count,
        "Citation edges written to the store"
    );

    describe_histogram!(
        format!("{}_crawl_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Duration of one crawl from the given roots"
    );

    // Backfill metrics
    describe_counter!(
        format!("{}_papers_fetched_total", METRICS_PREFIX),
        Unit::Count,
        "Paper metadata rows fetched by bulk lookup"
    );

    describe_counter!(
        format!("{}_papers_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Papers whose bulk lookup batch exhausted its retries"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to time one crawl
pub struct CrawlMetrics {
    start: Instant,
    direction: &'static str,
}

impl CrawlMetrics {
    pub fn start(direction: &'static str) -> Self {
        Self {
            start: Instant::now(),
            direction,
        }
    }

    /// Record crawl completion
    pub fn finish(self) {
        histogram!(
            format!("{}_crawl_duration_seconds", METRICS_PREFIX),
            "direction" => self.direction
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Record whether a node expansion came from the store
pub fn record_relation_cache(hit: bool, direction: &'static str) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        format!("{}_relation_cache_total", METRICS_PREFIX),
        "direction" => direction,
        "outcome" => outcome
    )
    .increment(1);

    if !hit {
        counter!(
            format!("{}_relations_requests_total", METRICS_PREFIX),
            "direction" => direction
        )
        .increment(1);
    }
}

pub fn record_edges_written(count: u64, direction: &'static str) {
    counter!(
        format!("{}_edges_written_total", METRICS_PREFIX),
        "direction" => direction
    )
    .increment(count);
}

/// Helper to record backfill outcome
pub fn record_backfill(fetched: usize, failed: usize) {
    counter!(format!("{}_papers_fetched_total", METRICS_PREFIX)).increment(fetched as u64);
    counter!(format!("{}_papers_failed_total", METRICS_PREFIX)).increment(failed as u64);
}
