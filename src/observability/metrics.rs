//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_upstream_attempts_total` (counter): outbound attempts by upstream, outcome
//! - `gateway_upstream_retries_total` (counter): retries by upstream, error kind
//! - `gateway_dedup_joins_total` (counter): callers attached to an in-flight request
//! - `gateway_queue_rejections_total` (counter): capacity / circuit / closed rejections
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_cache_lookups_total` (counter): by tier and hit/miss
//! - `gateway_validation_failures_total` (counter): by data type
//! - `gateway_fetch_outcomes_total` (counter): cached/fresh/stale/unavailable
//! - `gateway_warmup_duration_seconds` (histogram)
//! - `gateway_warmup_failed_keys` (gauge): keys that did not refresh in the last run
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so library users
//!   and tests pay nothing
//! - Labels are low-cardinality: upstream group, data type, outcome

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(upstream: &str, outcome: &'static str) {
    counter!(
        "gateway_upstream_attempts_total",
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry(upstream: &str, kind: &'static str) {
    counter!(
        "gateway_upstream_retries_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_dedup_join(upstream: &str) {
    counter!("gateway_dedup_joins_total", "upstream" => upstream.to_string()).increment(1);
}

pub fn record_rejection(upstream: &str, reason: &'static str) {
    counter!(
        "gateway_queue_rejections_total",
        "upstream" => upstream.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Circuit state as a gauge value (0=closed, 1=half-open, 2=open).
pub fn record_circuit_state(upstream: &str, state: u8) {
    gauge!("gateway_circuit_state", "upstream" => upstream.to_string()).set(state as f64);
}

pub fn record_cache_lookup(tier: &'static str, hit: bool) {
    counter!(
        "gateway_cache_lookups_total",
        "tier" => tier,
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_validation_failure(data_type: &str) {
    counter!(
        "gateway_validation_failures_total",
        "data_type" => data_type.to_string()
    )
    .increment(1);
}

pub fn record_fetch_outcome(data_type: &str, outcome: &'static str) {
    counter!(
        "gateway_fetch_outcomes_total",
        "data_type" => data_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_warmup(start: Instant, failed: usize) {
    histogram!("gateway_warmup_duration_seconds").record(start.elapsed().as_secs_f64());
    gauge!("gateway_warmup_failed_keys").set(failed as f64);
}
