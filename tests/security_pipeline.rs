//! Security middleware, rate limiting and admin API behavior through the full stack.

mod common;

use std::net::IpAddr;

use axum::http::{header, HeaderValue, Method, StatusCode};
use serde_json::json;

use common::{client_addr, request, send, test_app, test_config};
use todo_backend::admin::setup_admin_router;
use todo_backend::config::{AppConfig, Environment};
use todo_backend::security::AuditQuery;

#[tokio::test]
async fn rate_limit_rejects_after_budget() {
    let mut config = test_config();
    config.security.rate_limit.max_requests = 3;
    config.security.rate_limit.window_ms = 60_000;
    let (app, _state) = test_app(config);
    let from = client_addr(20);

    for expected_remaining in ["2", "1", "0"] {
        let res = send(&app, request(Method::GET, "/api/todos", None, from)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers["ratelimit-limit"], "3");
        assert_eq!(res.headers["ratelimit-remaining"], expected_remaining);
    }

    let limited = send(&app, request(Method::GET, "/api/todos", None, from)).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"], "Too many requests");
    assert_eq!(limited.body["retryAfter"], 60);
    assert!(limited.headers.contains_key(header::RETRY_AFTER));

    // Budgets are per client.
    let other = send(&app, request(Method::GET, "/api/todos", None, client_addr(21))).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn repeated_suspicious_requests_block_the_client() {
    let mut config = test_config();
    config.security.ip_blocking.max_failed_attempts = 3;
    let (app, state) = test_app(config);
    let from = client_addr(30);
    let ip: IpAddr = from.ip();

    // Detection is recorded but the request still proceeds.
    for _ in 0..3 {
        let res = send(
            &app,
            request(Method::GET, "/api/todos?filter=sql", None, from),
        )
        .await;
        assert_eq!(res.status, StatusCode::OK);
    }
    assert!(state.guard.is_ip_blocked(ip));

    let denied = send(&app, request(Method::GET, "/api/todos", None, from)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["error"], "Access Denied");

    let detections = state.guard.audit_log(&AuditQuery {
        event: Some("suspicious_request_detected".to_string()),
        ip: Some(ip),
        ..AuditQuery::default()
    });
    assert_eq!(detections.total, 3);

    let attempts = state.guard.audit_log(&AuditQuery {
        event: Some("blocked_ip_access_attempt".to_string()),
        ..AuditQuery::default()
    });
    assert_eq!(attempts.total, 1);

    // A different client is unaffected.
    let other = send(&app, request(Method::GET, "/api/todos", None, client_addr(31))).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn script_tags_are_escaped_before_storage() {
    let (app, state) = test_app(test_config());

    let res = send(
        &app,
        request(
            Method::POST,
            "/api/todos",
            Some(json!({ "text": "<script>alert(1)</script>" })),
            client_addr(40),
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let stored = state.todos.list();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].text.contains("<script"));
    assert!(stored[0].text.starts_with("&lt;script"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let (app, _state) = test_app(test_config());

    let res = send(&app, request(Method::GET, "/live", None, client_addr(50))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "SAMEORIGIN");
    assert!(res.headers.contains_key("content-security-policy"));
    assert!(res.headers.contains_key("strict-transport-security"));
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn cors_allows_listed_origins_only() {
    let mut config = test_config();
    config.environment = Environment::Production;
    config.security.cors.allowed_origins = vec!["https://todo.example.com".to_string()];
    let (app, _state) = test_app(config);

    let mut preflight = request(Method::OPTIONS, "/api/todos", None, client_addr(60));
    preflight.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("https://todo.example.com"),
    );
    preflight.headers_mut().insert(
        header::ACCESS_CONTROL_REQUEST_METHOD,
        HeaderValue::from_static("POST"),
    );
    let allowed = send(&app, preflight).await;
    assert_eq!(
        allowed.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://todo.example.com"
    );
    assert_eq!(allowed.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let mut foreign = request(Method::GET, "/api/todos", None, client_addr(61));
    foreign.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("https://evil.example.net"),
    );
    let denied = send(&app, foreign).await;
    assert!(!denied
        .headers
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn default_config_does_not_echo_foreign_origins() {
    let (app, _state) = test_app(AppConfig::default());

    let mut foreign = request(Method::GET, "/api/todos", None, client_addr(62));
    foreign.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("https://evil.example.net"),
    );
    let res = send(&app, foreign).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(!res.headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    let mut listed = request(Method::GET, "/api/todos", None, client_addr(63));
    listed.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("http://localhost:3000"),
    );
    let res = send(&app, listed).await;
    assert_eq!(
        res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn admin_api_requires_bearer_token() {
    let mut config = test_config();
    config.admin.api_key = "letmein".to_string();
    let (_app, state) = test_app(config);
    let admin = setup_admin_router(state.clone());

    let anonymous = send(&admin, request(Method::GET, "/admin/status", None, client_addr(70))).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let failures = state.guard.audit_log(&AuditQuery {
        event: Some("admin_auth_failed".to_string()),
        ..AuditQuery::default()
    });
    assert_eq!(failures.total, 1);

    let mut authorized = request(Method::GET, "/admin/status", None, client_addr(70));
    authorized.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer letmein"),
    );
    let status = send(&admin, authorized).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["status"], "operational");
}

#[tokio::test]
async fn admin_block_and_unblock_round_trip() {
    let mut config = test_config();
    config.admin.api_key = "letmein".to_string();
    let (app, state) = test_app(config);
    let admin = setup_admin_router(state.clone());
    let target = client_addr(80);

    let authed = |method: Method, uri: &str, body: Option<serde_json::Value>| {
        let mut req = request(method, uri, body, client_addr(81));
        req.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer letmein"),
        );
        req
    };

    let blocked = send(
        &admin,
        authed(
            Method::POST,
            "/admin/security/block",
            Some(json!({ "ip": target.ip(), "reason": "manual" })),
        ),
    )
    .await;
    assert_eq!(blocked.status, StatusCode::OK);

    let denied = send(&app, request(Method::GET, "/api/todos", None, target)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let unblocked = send(
        &admin,
        authed(
            Method::POST,
            "/admin/security/unblock",
            Some(json!({ "ip": target.ip() })),
        ),
    )
    .await;
    assert_eq!(unblocked.body["data"]["wasBlocked"], true);

    let allowed = send(&app, request(Method::GET, "/api/todos", None, target)).await;
    assert_eq!(allowed.status, StatusCode::OK);

    let metrics = send(&admin, authed(Method::GET, "/admin/security/metrics", None)).await;
    assert_eq!(metrics.status, StatusCode::OK);
    assert_eq!(metrics.body["blockedIPs"], 0);
}
