//! Bearer-token authentication for the admin API.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::logging;

/// The configured key is read per request so reloads rotate it.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expected = format!("Bearer {}", state.config.load().admin.api_key);
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if presented.is_some_and(|value| tokens_match(value, &expected)) {
        logging::auth("admin_request_authorized", Some("admin"));
        return next.run(request).await;
    }

    let ip = request.client_ip();
    logging::auth("admin_auth_failed", None);
    state.guard.log_event(
        "admin_auth_failed",
        Some(ip),
        json!({
            "url": request.uri().to_string(),
            "hasAuthorization": presented.is_some(),
        }),
    );

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Unauthorized",
            "message": "A valid admin bearer token is required",
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

/// Comparison time depends only on length, not on where the first mismatch is.
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("Bearer abc", "Bearer abc"));
        assert!(!tokens_match("Bearer abd", "Bearer abc"));
        assert!(!tokens_match("Bearer ab", "Bearer abc"));
        assert!(!tokens_match("", "Bearer abc"));
    }
}
