//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, outcome
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_discovery_refresh_total` (counter): lookups by service, result
//! - `gateway_upstream_handles` (gauge): pooled upstream handles
//!
//! Updates go through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(service: &str, outcome: &'static str, start: Instant) {
    let service = service.to_string();
    counter!("gateway_requests_total", "service" => service.clone(), "outcome" => outcome)
        .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service)
        .record(start.elapsed().as_secs_f64());
}

/// Record a discovery lookup result.
pub fn record_discovery(service: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("gateway_discovery_refresh_total", "service" => service.to_string(), "result" => result)
        .increment(1);
}

/// Record the number of pooled upstream handles.
pub fn record_upstream_handles(count: usize) {
    gauge!("gateway_upstream_handles").set(count as f64);
}
