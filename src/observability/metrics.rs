//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count handler attempts and final outcomes per handler shape
//! - Record end-to-end dispatch latency
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `jsonhttp_requests_total` (counter): requests by shape, outcome
//! - `jsonhttp_handler_attempts_total` (counter): handler invocations by shape
//! - `jsonhttp_request_duration_seconds` (histogram): latency by shape
//!
//! Outcomes are `ok`, `coded`, `server_error`, `busy` and `adapt_error`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "jsonhttp_requests_total";
pub const HANDLER_ATTEMPTS_TOTAL: &str = "jsonhttp_handler_attempts_total";
pub const REQUEST_DURATION_SECONDS: &str = "jsonhttp_request_duration_seconds";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_outcome(shape: &'static str, outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "shape" => shape, "outcome" => outcome).increment(1);
}

pub fn record_attempt(shape: &'static str) {
    counter!(HANDLER_ATTEMPTS_TOTAL, "shape" => shape).increment(1);
}

pub fn record_duration(shape: &'static str, start: Instant) {
    histogram!(REQUEST_DURATION_SECONDS, "shape" => shape).record(start.elapsed().as_secs_f64());
}
