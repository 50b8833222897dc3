//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pb_admin_requests_total` (counter): admin API calls by operation, status
//! - `pb_forwarded_requests_total` (counter): public requests by status
//! - `pb_lifecycle_transitions_total` (counter): adapter transitions by target state

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::state::LifecycleState;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admin_request(op: &'static str, status: u16) {
    metrics::counter!(
        "pb_admin_requests_total",
        "op" => op,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_forwarded(status: u16) {
    metrics::counter!("pb_forwarded_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_transition(state: LifecycleState) {
    metrics::counter!("pb_lifecycle_transitions_total", "state" => state.as_str()).increment(1);
}
