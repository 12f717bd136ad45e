//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use todo_backend::config::{AppConfig, Environment};
use todo_backend::{AppState, HttpServer, Shutdown};

/// Defaults minus anything that touches the host: no files, no exporter, no samples.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Test;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.todos.seed_samples = false;
    config.observability.file_logging = false;
    config.observability.metrics_enabled = false;
    config
}

/// Router and state for in-process requests.
pub fn test_app(config: AppConfig) -> (Router, AppState) {
    let server = HttpServer::new(config).unwrap();
    (server.router(), server.state().clone())
}

pub fn client_addr(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 40000))
}

/// Build a request as if it arrived from `from`.
pub fn request(method: Method, uri: &str, body: Option<Value>, from: SocketAddr) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(from));
    request
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Drive one request through the full middleware stack.
pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Run a real server on an ephemeral port.
pub async fn spawn_server(config: AppConfig) -> (SocketAddr, AppState, Arc<Shutdown>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let state = server.state().clone();
    let shutdown = Arc::new(Shutdown::new());

    let stop = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, None, &stop).await.unwrap();
    });

    (addr, state, shutdown)
}
