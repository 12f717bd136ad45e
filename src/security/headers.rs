//! Security response headers.
//!
//! # Responsibilities
//! - Add CSP, HSTS and the fixed hardening headers to every response
//!
//! # Design Decisions
//! - Headers already set by a handler are not overwritten
//! - Can be switched off with `security.enable_headers`

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::security::guard::SecurityGuard;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
style-src 'self' 'unsafe-inline'; \
script-src 'self'; \
img-src 'self' data: https:; \
connect-src 'self'; \
font-src 'self'; \
object-src 'none'; \
media-src 'self'; \
frame-src 'none'; \
child-src 'none'; \
worker-src 'self'; \
manifest-src 'self'; \
upgrade-insecure-requests";

pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains; preload";

/// The full fixed header set.
pub fn security_headers() -> [(HeaderName, HeaderValue); 12] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
        ),
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (
            HeaderName::from_static("x-download-options"),
            HeaderValue::from_static("noopen"),
        ),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("origin-agent-cluster"),
            HeaderValue::from_static("?1"),
        ),
    ]
}

/// Middleware adding the security header set.
pub async fn security_headers_middleware(
    State(guard): State<Arc<SecurityGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if guard.policy().enable_headers {
        let headers = response.headers_mut();
        for (name, value) in security_headers() {
            headers.entry(name).or_insert(value);
        }
        headers.remove("x-powered-by");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csp_contains_every_directive() {
        for directive in [
            "default-src 'self'",
            "style-src 'self' 'unsafe-inline'",
            "img-src 'self' data: https:",
            "object-src 'none'",
            "frame-src 'none'",
            "upgrade-insecure-requests",
        ] {
            assert!(CONTENT_SECURITY_POLICY.contains(directive), "{}", directive);
        }
    }

    #[test]
    fn header_names_are_unique() {
        let headers = security_headers();
        let mut names: Vec<_> = headers.iter().map(|(n, _)| n.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), headers.len());
    }
}
