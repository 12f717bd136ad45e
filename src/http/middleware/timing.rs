//! Request timing.
//!
//! Records every response in the performance sampler and Prometheus,
//! writes the `http` access log line, and warns on slow requests.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::performance::{ErrorRecord, ResponseRecord};
use crate::observability::{logging, metrics};

pub async fn timing_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let url = request.uri().to_string();
    let ip = request.client_ip();
    let request_id = request.request_id().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let status = response.status();

    metrics::record_request(&method, status.as_u16(), start);
    logging::request(
        &method,
        &url,
        status.as_u16(),
        elapsed_ms,
        user_agent.as_deref(),
        Some(ip),
    );

    state.performance.record_response_time(ResponseRecord {
        method: method.clone(),
        url: url.clone(),
        status_code: status.as_u16(),
        response_time: elapsed_ms,
        user_agent,
        ip: Some(ip),
    });

    if status.is_server_error() {
        state.performance.record_error(ErrorRecord {
            message: format!("{} {} failed with {}", method, url, status),
            code: Some(status.as_u16().to_string()),
            operation: Some(format!("{} {}", method, url)),
            ip: Some(ip),
        });
    }

    let slow = Duration::from_millis(state.config.load().performance.slow_request_ms);
    if elapsed > slow {
        tracing::warn!(
            category = "performance",
            request_id = %request_id,
            method = %method,
            url = %url,
            duration_ms = elapsed_ms,
            threshold_ms = slow.as_millis() as u64,
            "Slow request detected"
        );
    }

    response
}
