//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): forwarded calls by method, status, outcome
//! - `gateway_request_duration_seconds` (histogram): round-trip latency
//! - `gateway_session_invalidations_total` (counter): cleared sessions by reason
//! - `gateway_probe_total` (counter): liveness probes by result
//! - `gateway_probe_duration_seconds` (histogram): probe latency
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_invalidation(reason: &'static str) {
    counter!("gateway_session_invalidations_total", "reason" => reason).increment(1);
}

pub fn record_probe(alive: bool, start: Instant) {
    let result = if alive { "alive" } else { "down" };
    counter!("gateway_probe_total", "result" => result).increment(1);
    histogram!("gateway_probe_duration_seconds").record(start.elapsed().as_secs_f64());
}
