//! Cross-origin policy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, HeaderName, HeaderValue, Method};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Environment;
use crate::observability::logging;
use crate::security::guard::SecurityGuard;

pub const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Whether `origin` may make credentialed cross-origin requests.
///
/// Only an explicit development environment allows every origin. Requests without an `Origin`
/// header never reach this check; CORS does not apply to them.
pub fn origin_allowed(origin: &str, allowed: &[String], environment: Environment) -> bool {
    environment == Environment::Development || allowed.iter().any(|o| o == origin)
}

/// Build the CORS layer. The allow-list is read from the guard's current
/// policy on every request so reloads take effect immediately.
pub fn cors_layer(guard: Arc<SecurityGuard>, environment: Environment) -> CorsLayer {
    let max_age = Duration::from_secs(guard.policy().cors.max_age_secs);

    let predicate_guard = guard.clone();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
        let origin = origin.to_str().unwrap_or_default();
        let policy = predicate_guard.policy();
        let allowed = origin_allowed(origin, &policy.cors.allowed_origins, environment);
        if !allowed {
            let ip = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip());
            logging::security(
                "cors_origin_blocked",
                ip,
                &json!({
                    "origin": origin,
                    "userAgent": parts
                        .headers
                        .get(header::USER_AGENT)
                        .and_then(|v| v.to_str().ok()),
                }),
            );
        }
        allowed
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([X_TOTAL_COUNT])
        .max_age(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_and_development_mode() {
        let allowed = vec!["http://localhost:3000".to_string()];
        assert!(origin_allowed("http://localhost:3000", &allowed, Environment::Production));
        assert!(!origin_allowed("https://evil.example", &allowed, Environment::Production));
        assert!(origin_allowed("https://evil.example", &allowed, Environment::Development));
        assert!(!origin_allowed("https://evil.example", &allowed, Environment::Test));
        assert!(!origin_allowed("https://evil.example", &allowed, Environment::Unspecified));
    }
}
