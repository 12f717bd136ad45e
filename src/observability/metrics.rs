//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, security events, records)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `todo_http_requests_total` (counter): requests by method, status
//! - `todo_http_request_duration_seconds` (histogram): latency distribution
//! - `todo_rate_limited_total` (counter): requests rejected by the rate limiter
//! - `todo_security_events_total` (counter): audit events by type
//! - `todo_blocked_ips` (gauge): currently blocked addresses
//! - `todo_records` (gauge): todos held in memory
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording is a no-op until a recorder is installed, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!("todo_http_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("todo_http_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("todo_rate_limited_total").increment(1);
}

/// Record an audit event.
pub fn record_security_event(event: &str) {
    counter!("todo_security_events_total", "event" => event.to_string()).increment(1);
}

pub fn set_blocked_ips(count: usize) {
    gauge!("todo_blocked_ips").set(count as f64);
}

pub fn set_todo_records(count: usize) {
    gauge!("todo_records").set(count as f64);
}
