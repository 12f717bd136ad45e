//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the todo backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment (development, production, test).
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Database dependency used by the readiness checks.
    pub database: DatabaseConfig,

    /// In-memory todo store settings.
    pub todos: TodoConfig,

    /// Security middleware policy.
    pub security: SecurityConfig,

    /// Performance sampler settings.
    pub performance: PerformanceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl AppConfig {
    /// True when CORS and error detail relax for local development.
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// No environment named. CORS stays on the allow-list.
    #[default]
    Unspecified,
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Unspecified => "unspecified",
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unspecified" => Ok(Environment::Unspecified),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// How the database dependency is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Always reports connected; records live in memory.
    #[default]
    Simulated,
    /// Opens a TCP connection to the host named in `uri`.
    Tcp,
}

/// Database dependency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string (MONGODB_URI).
    pub uri: String,

    /// Probe strategy for health checks.
    pub probe: ProbeMode,

    /// Probe timeout in milliseconds.
    pub probe_timeout_ms: u64,

    /// How long a probe result is reused, in seconds.
    pub cache_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/todo_dev".to_string(),
            probe: ProbeMode::Simulated,
            probe_timeout_ms: 2000,
            cache_secs: 30,
        }
    }
}

/// In-memory todo store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TodoConfig {
    /// Seed the store with sample records at startup.
    pub seed_samples: bool,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self { seed_samples: true }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// IP reputation policy.
    pub ip_blocking: IpBlockingConfig,

    /// Audit log bounds.
    pub audit: AuditConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Interval between security state cleanups, in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 10 * 1024 * 1024, // 10MB
            ip_blocking: IpBlockingConfig::default(),
            audit: AuditConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            cleanup_interval_secs: 24 * 60 * 60,
        }
    }
}

/// IP blocking thresholds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IpBlockingConfig {
    /// Failed attempts before an address is blocked.
    pub max_failed_attempts: u32,

    /// How long a block lasts, in milliseconds.
    pub block_duration_ms: u64,

    /// Idle failed-attempt records and audit events older than this are purged.
    pub retention_days: u64,
}

impl IpBlockingConfig {
    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_duration_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

impl Default for IpBlockingConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 10,
            block_duration_ms: 60 * 60 * 1000, // 1 hour
            retention_days: 7,
        }
    }
}

/// Audit log bounds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Hard cap on retained events.
    pub max_entries: usize,

    /// Events kept after the cap is exceeded.
    pub retain_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            retain_entries: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per window per IP.
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000, // 15 minutes
            max_requests: 100,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed outside development mode (ALLOWED_ORIGINS).
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            max_age_secs: 86_400,
        }
    }
}

/// Performance sampler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum entries kept per metric stream.
    pub max_history: usize,

    /// Maximum age of a metric entry, in seconds.
    pub max_age_secs: u64,

    /// Interval of the periodic eviction pass, in seconds.
    pub cleanup_interval_secs: u64,

    /// Interval between system resource samples, in seconds.
    pub system_sample_interval_secs: u64,

    /// Requests slower than this are logged at warn, in milliseconds.
    pub slow_request_ms: u64,

    /// Alerting thresholds.
    pub thresholds: AlertThresholds,
}

impl PerformanceConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            max_age_secs: 60 * 60,
            cleanup_interval_secs: 5 * 60,
            system_sample_interval_secs: 30,
            slow_request_ms: 1000,
            thresholds: AlertThresholds::default(),
        }
    }
}

/// Alert thresholds for the performance sampler.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AlertThresholds {
    /// Response time in milliseconds.
    pub response_time_ms: f64,
    /// Fraction of failed requests.
    pub error_rate: f64,
    /// Fraction of memory in use.
    pub memory_usage: f64,
    /// Fraction of CPU in use.
    pub cpu_usage: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 2000.0,
            error_rate: 0.05,
            memory_usage: 0.85,
            cpu_usage: 0.8,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). Unset picks by environment.
    pub log_level: Option<String>,

    /// Directory for rotating log files.
    pub log_dir: String,

    /// Write JSON log files in addition to the console.
    pub file_logging: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            log_dir: "logs".to_string(),
            file_logging: true,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = AppConfig::default();
        assert_eq!(config.security.ip_blocking.max_failed_attempts, 10);
        assert_eq!(config.security.ip_blocking.block_duration(), Duration::from_secs(3600));
        assert_eq!(config.security.audit.max_entries, 10_000);
        assert_eq!(config.security.audit.retain_entries, 5_000);
        assert_eq!(config.security.rate_limit.window(), Duration::from_secs(900));
        assert_eq!(config.security.rate_limit.max_requests, 100);
        assert_eq!(config.performance.max_history, 1000);
        assert_eq!(config.environment, Environment::Unspecified);
        assert!(!config.is_development());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            environment = "production"

            [security.rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.security.rate_limit.max_requests, 5);
        assert_eq!(config.security.rate_limit.window_ms, 900_000);
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("".parse::<Environment>().unwrap(), Environment::Unspecified);
        assert!("staging".parse::<Environment>().is_err());
    }
}
