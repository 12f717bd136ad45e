//! Per-request security pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → blocked IP?          yes → 403 + blocked_ip_access_attempt
//!     → suspicious pattern?  yes → suspicious_request_detected + failed attempt (continues)
//!     → request_started
//!     → sanitize query string and JSON body
//!     → handler
//!     → request_completed (+ error_response when status >= 400)
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, uri::PathAndQuery, HeaderMap, HeaderValue, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};

use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::security::guard::SecurityGuard;
use crate::security::patterns::RequestInspector;

pub const BLOCKED_MESSAGE: &str = "Your IP address has been blocked due to suspicious activity.";

/// Middleware enforcing IP blocks, detection, sanitization and auditing.
pub async fn security_middleware(
    State(guard): State<Arc<SecurityGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let ip = request.client_ip();
    let method = request.method().to_string();
    let url = request.uri().to_string();
    let user_agent = header_string(request.headers(), header::USER_AGENT);

    if guard.is_ip_blocked(ip) {
        guard.log_event(
            "blocked_ip_access_attempt",
            Some(ip),
            json!({ "userAgent": user_agent, "url": url, "method": method }),
        );
        return ApiError::AccessDenied(BLOCKED_MESSAGE.to_string()).into_response();
    }

    if guard.is_suspicious_request(request.uri(), request.headers()) {
        guard.log_event(
            "suspicious_request_detected",
            Some(ip),
            json!({
                "url": url,
                "method": method,
                "userAgent": user_agent,
                "headers": headers_json(request.headers()),
            }),
        );
        guard.record_failed_attempt(ip, "suspicious_pattern");
    }

    guard.log_event(
        "request_started",
        Some(ip),
        json!({
            "method": method,
            "url": url,
            "userAgent": user_agent,
            "referer": header_string(request.headers(), header::REFERER),
        }),
    );

    let max_body = guard.policy().max_body_size;
    let response = match sanitize_request(guard.inspector(), request, max_body).await {
        Ok(request) => next.run(request).await,
        Err(err) => err.into_response(),
    };

    let status = response.status().as_u16();
    let response_size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    guard.log_event(
        "request_completed",
        Some(ip),
        json!({
            "method": method,
            "url": url,
            "statusCode": status,
            "duration": started.elapsed().as_millis() as u64,
            "responseSize": response_size,
        }),
    );

    if status >= 400 {
        guard.log_event(
            "error_response",
            Some(ip),
            json!({
                "method": method,
                "url": url,
                "statusCode": status,
                "userAgent": user_agent,
            }),
        );
    }

    response
}

/// Rewrite the query string and JSON body with sanitized values.
///
/// Bodies that are not JSON, or fail to parse, pass through unchanged.
pub async fn sanitize_request(
    inspector: &RequestInspector,
    request: Request<Body>,
    max_body: usize,
) -> Result<Request<Body>, ApiError> {
    let (mut parts, body) = request.into_parts();

    if let Some(clean) = parts.uri.query().and_then(|q| inspector.sanitize_query(q)) {
        if let Some(uri) = with_query(&parts.uri, &clean) {
            parts.uri = uri;
        }
    }

    if !is_json(&parts.headers) {
        return Ok(Request::from_parts(parts, body));
    }

    let bytes = axum::body::to_bytes(body, max_body)
        .await
        .map_err(|_| ApiError::PayloadTooLarge { limit: max_body })?;

    let bytes = match serde_json::from_slice::<Value>(&bytes) {
        Ok(mut value) => {
            if inspector.sanitize_value(&mut value) {
                let rewritten = Bytes::from(value.to_string());
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                rewritten
            } else {
                bytes
            }
        }
        Err(_) => bytes,
    };

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn with_query(uri: &Uri, query: &str) -> Option<Uri> {
    let mut parts = uri.clone().into_parts();
    let pq = PathAndQuery::from_str(&format!("{}?{}", uri.path(), query)).ok()?;
    parts.path_and_query = Some(pq);
    Uri::from_parts(parts).ok()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn headers_json(headers: &HeaderMap) -> Value {
    let map: Map<String, Value> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()),
            )
        })
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(request: Request<Body>) -> Value {
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rewrites_json_body_and_query() {
        let inspector = RequestInspector::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/todos?note=javascript:x")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text":"<script>hi</script>","priority":"high"}"#))
            .unwrap();

        let request = sanitize_request(&inspector, request, 1024).await.unwrap();
        assert_eq!(request.uri().query(), Some("note=removed%3Ax"));
        let body = body_json(request).await;
        assert_eq!(body["text"], "&lt;script>hi&lt;/script&gt;");
        assert_eq!(body["priority"], "high");
    }

    #[tokio::test]
    async fn invalid_json_passes_through() {
        let inspector = RequestInspector::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/todos")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json <script>"))
            .unwrap();

        let request = sanitize_request(&inspector, request, 1024).await.unwrap();
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"{not json <script>");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let inspector = RequestInspector::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/todos")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(vec![b' '; 64]))
            .unwrap();

        let err = sanitize_request(&inspector, request, 16).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 16 }));
    }
}
