//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define redemption metrics (outcomes, transfer latency, ledger size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `redeemer_redemptions_total` (counter): attempts by outcome
//! - `redeemer_transfer_duration_seconds` (histogram): transfer + confirmation latency
//! - `redeemer_inconsistent_commits_total` (counter): tokens sent but ledger not updated
//! - `redeemer_ledger_codes` (gauge): codes by state (used/unused)
//! - `redeemer_rate_limited_total` (counter): rejected by the rate limiter
//! - `redeemer_http_requests_total` (counter): requests by method, status
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels never carry codes or addresses

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::ledger::LedgerStats;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one finished redemption attempt.
pub fn record_redemption(outcome: &'static str) {
    counter!("redeemer_redemptions_total", "outcome" => outcome).increment(1);
}

/// Record how long a transfer call took.
pub fn record_transfer(duration: Duration, success: bool) {
    let result = if success { "success" } else { "failure" };
    histogram!("redeemer_transfer_duration_seconds", "result" => result)
        .record(duration.as_secs_f64());
}

/// Tokens went out but the code could not be marked used.
pub fn record_inconsistent_commit() {
    counter!("redeemer_inconsistent_commits_total").increment(1);
}

/// Publish current ledger counts.
pub fn record_ledger(stats: &LedgerStats) {
    gauge!("redeemer_ledger_codes", "state" => "used").set(stats.used as f64);
    gauge!("redeemer_ledger_codes", "state" => "unused").set(stats.unused as f64);
}

/// A request was rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("redeemer_rate_limited_total").increment(1);
}

/// Count an HTTP response.
pub fn record_request(method: &str, status: u16) {
    counter!(
        "redeemer_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
