//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health, /ready:
//!     → probe.rs CachedProbe (reuse result for database.cache_secs)
//!         → DependencyProbe (simulated | tcp connect with timeout)
//!     → handlers.rs builds the report (+ host resources for /health)
//!
//! GET /live, /startup: static, never touch dependencies
//! ```
//!
//! # Design Decisions
//! - Liveness never depends on the database; readiness does
//! - The probe is a trait object so tests and deployments can swap it

pub mod handlers;
pub mod probe;

use axum::{routing::get, Router};

use crate::http::server::AppState;
use self::handlers::*;

pub use probe::{CachedProbe, DependencyProbe, ProbeResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api", get(api_index))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/startup", get(startup))
}
