//! Service-level health, readiness and info endpoints.

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::http::server::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const MB: u64 = 1024 * 1024;

const NO_CACHE: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

fn megabytes(bytes: u64) -> String {
    format!("{}MB", (bytes as f64 / MB as f64).round() as u64)
}

/// Full health report: database probe, host resources, API latency.
/// 503 when the database is not connected.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let database = state.database.status().await;
    let system = state.sampler.sample();
    let response_time = format!("{}ms", started.elapsed().as_millis());

    let healthy = database.is_connected();
    let label = if healthy { "healthy" } else { "unhealthy" };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::info!(
        category = "health",
        status = label,
        response_time = %response_time,
        database_status = ?database.status,
        "Health check completed"
    );

    let body = json!({
        "status": label,
        "timestamp": Utc::now().to_rfc3339(),
        "responseTime": response_time,
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "version": VERSION,
        "environment": state.config.load().environment.as_str(),
        "checks": {
            "database": {
                "status": database.status,
                "lastCheck": database.last_check.to_rfc3339(),
            },
            "system": {
                "status": "operational",
                "memory": {
                    "total": megabytes(system.memory.total),
                    "free": megabytes(system.memory.free),
                    "used": megabytes(system.memory.used),
                },
                "cpu": {
                    "count": system.cpu.count,
                    "loadAverage": system.cpu.load_average,
                },
            },
            "api": {
                "status": "operational",
                "responseTime": response_time,
            },
        },
    });

    (status, NO_CACHE, Json(body))
}

/// Readiness follows the database probe.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.database.status().await;
    if database.is_connected() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "message": "Service is ready to accept traffic",
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "timestamp": Utc::now().to_rfc3339(),
                "reason": "Database not connected",
            })),
        )
    }
}

pub async fn live(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

pub async fn startup() -> impl IntoResponse {
    Json(json!({
        "status": "started",
        "message": "Service has finished starting up",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to To-Do List API",
        "version": VERSION,
        "endpoints": {
            "health": "GET /api/todos/health",
            "create": "POST /api/todos",
            "list": "GET /api/todos",
            "get": "GET /api/todos/{id}",
            "update": "PUT /api/todos/{id}",
            "delete": "DELETE /api/todos/{id}",
            "status": "PATCH /api/todos/{id}/status",
            "search": "GET /api/todos/search/{query}",
            "stats": "GET /api/todos/stats/overview",
        },
    }))
}

pub async fn api_index() -> impl IntoResponse {
    Json(json!({
        "name": "Todo API",
        "version": VERSION,
        "description": "RESTful API for Todo CRUD operations",
        "endpoints": {
            "todos": {
                "GET /api/todos": "Get all todos with optional filtering",
                "POST /api/todos": "Create a new todo",
                "GET /api/todos/stats/overview": "Get todo statistics",
                "GET /api/todos/search/{query}": "Search todos",
                "GET /api/todos/priority/{priority}": "Get todos by priority",
                "GET /api/todos/{id}": "Get specific todo",
                "PUT /api/todos/{id}": "Update specific todo",
                "PATCH /api/todos/{id}": "Set completion or status",
                "DELETE /api/todos/{id}": "Delete specific todo",
                "PATCH /api/todos/{id}/toggle": "Toggle todo completion",
                "PATCH /api/todos/{id}/status": "Set todo status",
                "DELETE /api/todos/cleanup/old": "Remove old completed todos",
            },
            "health": ["GET /health", "GET /ready", "GET /live", "GET /startup"],
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megabytes_rounds() {
        assert_eq!(megabytes(0), "0MB");
        assert_eq!(megabytes(3 * MB / 2), "2MB");
        assert_eq!(megabytes(16 * 1024 * MB), "16384MB");
    }
}
