//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CSP, HSTS and hardening headers on the way out)
//!     → cors.rs (origin allow-list)
//!     → rate_limit.rs (fixed window per IP)
//!     → middleware.rs (IP block, detection, sanitization, audit)
//!         uses guard.rs (reputation state), patterns.rs (rules), audit.rs (event log)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Suspicious requests are recorded, not rejected; repeat offenders get blocked
//! - No trust in client input

pub mod audit;
pub mod cors;
pub mod guard;
pub mod headers;
pub mod middleware;
pub mod patterns;
pub mod rate_limit;

pub use audit::{AuditEvent, AuditQuery, SecuritySummary};
pub use guard::SecurityGuard;
pub use rate_limit::RateLimiter;
