//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse, apply PORT/NODE_ENV/LOG_LEVEL/ALLOWED_ORIGINS/MONGODB_URI)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared with subsystems at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps security policy and alert thresholds
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only policy knobs are hot-reloadable; listeners need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_startup_config, ConfigError};
pub use schema::{
    AdminConfig, AlertThresholds, AppConfig, AuditConfig, CorsConfig, DatabaseConfig,
    Environment, IpBlockingConfig, ListenerConfig, ObservabilityConfig, PerformanceConfig,
    ProbeMode, RateLimitConfig, SecurityConfig, TimeoutConfig, TodoConfig,
};
