//! Admin API, served on its own listener when `admin.enabled`.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/security/audit", get(get_audit_log))
        .route("/admin/security/summary", get(get_security_summary))
        .route("/admin/security/metrics", get(get_security_metrics))
        .route("/admin/security/block", post(block_ip))
        .route("/admin/security/unblock", post(unblock_ip))
        .route("/admin/security/cleanup", post(run_security_cleanup))
        .route("/admin/performance", get(get_performance))
        .route("/admin/performance/thresholds", put(set_thresholds))
        .route("/admin/performance/reset", post(reset_performance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}
