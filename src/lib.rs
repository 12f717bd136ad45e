//! Todo API backend library.
//!
//! ```text
//!   client ──▶ http::server (request id, trace, timing)
//!                 │
//!                 ▼
//!              security (headers, CORS, rate limit, block/detect/sanitize/audit)
//!                 │
//!                 ▼
//!              todos / health handlers ──▶ TodoStore, DependencyProbe
//!
//!   admin (separate listener) ──▶ SecurityGuard, PerformanceMonitor
//!   lifecycle ──▶ signals, shutdown broadcast, maintenance loops
//!   observability ──▶ tracing files, Prometheus, performance sampler
//! ```

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod todos;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
