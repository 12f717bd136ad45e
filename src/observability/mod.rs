//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured, categorized log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → performance.rs (timers, response samples, alerts)
//!
//! Background sampling:
//!     → system.rs (memory, CPU, load average) → performance.rs
//!
//! Consumers:
//!     → Log files (combined, error, security) and console
//!     → Metrics endpoint (Prometheus scrape)
//!     → Admin performance report
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod performance;
pub mod system;

pub use performance::PerformanceMonitor;
pub use system::SystemSampler;
