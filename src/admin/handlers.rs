use std::net::IpAddr;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AlertThresholds;
use crate::http::response::{ApiError, ApiResponse};
use crate::http::server::AppState;
use crate::observability::performance::PerformanceReport;
use crate::security::audit::AuditPage;
use crate::security::guard::SecuritySnapshot;
use crate::security::{AuditQuery, SecuritySummary};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environment: &'static str,
    pub uptime_secs: u64,
    pub todos: usize,
    pub blocked_ips: usize,
    pub rate_limited_clients: usize,
    pub active_timers: usize,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub ip: IpAddr,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockRequest {
    pub ip: IpAddr,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environment: state.config.load().environment.as_str(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        todos: state.todos.len(),
        blocked_ips: state.guard.snapshot().blocked_ips,
        rate_limited_clients: state.limiter.tracked_clients(),
        active_timers: state.performance.active_timers(),
    })
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<AuditPage>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.guard.audit_log(&query)))
}

pub async fn get_security_summary(State(state): State<AppState>) -> Json<SecuritySummary> {
    Json(state.guard.summary())
}

pub async fn get_security_metrics(State(state): State<AppState>) -> Json<SecuritySnapshot> {
    Json(state.guard.snapshot())
}

pub async fn block_ip(
    State(state): State<AppState>,
    payload: Result<Json<BlockRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Json(body) = payload?;
    let reason = body.reason.unwrap_or_else(|| "manual_block".to_string());
    state.guard.block_ip(body.ip, &reason);
    Ok(ApiResponse::ok(
        json!({ "ip": body.ip, "reason": reason }),
        "IP address blocked",
    ))
}

pub async fn unblock_ip(
    State(state): State<AppState>,
    payload: Result<Json<UnblockRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Json(body) = payload?;
    let was_blocked = state.guard.unblock_ip(body.ip);
    Ok(ApiResponse::ok(
        json!({ "ip": body.ip, "wasBlocked": was_blocked }),
        if was_blocked {
            "IP address unblocked"
        } else {
            "IP address was not blocked"
        },
    ))
}

pub async fn run_security_cleanup(State(state): State<AppState>) -> ApiResponse<SecuritySnapshot> {
    state.guard.cleanup();
    ApiResponse::ok(state.guard.snapshot(), "Security cleanup completed")
}

pub async fn get_performance(State(state): State<AppState>) -> Json<PerformanceReport> {
    Json(state.performance.report())
}

pub async fn set_thresholds(
    State(state): State<AppState>,
    payload: Result<Json<AlertThresholds>, JsonRejection>,
) -> Result<ApiResponse<AlertThresholds>, ApiError> {
    let Json(thresholds) = payload?;
    for (name, value) in [
        ("error_rate", thresholds.error_rate),
        ("memory_usage", thresholds.memory_usage),
        ("cpu_usage", thresholds.cpu_usage),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ApiError::bad_request("Invalid threshold")
                .with_message(format!("{} must be between 0 and 1", name)));
        }
    }
    state.performance.set_alert_thresholds(thresholds);
    Ok(ApiResponse::ok(thresholds, "Alert thresholds updated"))
}

pub async fn reset_performance(State(state): State<AppState>) -> ApiResponse<Value> {
    state.performance.reset();
    ApiResponse::ok(json!({}), "Performance metrics reset")
}
