//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (console + rotating JSON files)
//! - Provide category helpers that tag events consistently
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for files, human format for the console outside production
//! - Three daily files: `combined` (everything), `error` (ERROR), `security` (WARN+)
//! - File writers are non-blocking; events are dropped rather than stalling requests

use std::net::IpAddr;
use std::path::Path;

use serde_json::Value;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{AppConfig, Environment};

/// Service name attached to every categorized event.
pub const SERVICE: &str = "todo-backend";

/// Keeps the background file writers alive. Dropping it flushes and stops them.
#[must_use = "dropping the guards stops file logging"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Pick the effective filter directive.
///
/// `log_level` (config or `LOG_LEVEL`) wins; otherwise `info` in production
/// and `debug` everywhere else.
pub fn default_directive(config: &AppConfig) -> String {
    match &config.observability.log_level {
        Some(level) => level.clone(),
        None if config.environment == Environment::Production => "info".to_string(),
        None => "debug".to_string(),
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` still takes precedence for ad-hoc debugging.
pub fn init(config: &AppConfig) -> Result<LogGuards, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config)))?;

    let mut guards = Vec::new();
    let mut file_layers = Vec::new();

    if config.observability.file_logging {
        let dir = Path::new(&config.observability.log_dir);
        std::fs::create_dir_all(dir)?;

        for (file, level) in [
            ("combined.log", LevelFilter::TRACE),
            ("error.log", LevelFilter::ERROR),
            ("security.log", LevelFilter::WARN),
        ] {
            let appender = tracing_appender::rolling::daily(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            file_layers.push(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_filter(level)
                    .boxed(),
            );
        }
    }

    let console = (config.environment != Environment::Production)
        .then(|| fmt::layer().with_target(false).compact());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layers)
        .with(console)
        .try_init()?;

    Ok(LogGuards { _guards: guards })
}

/// Timing of an operation.
pub fn performance(operation: &str, duration_ms: f64) {
    tracing::info!(
        category = "performance",
        service = SERVICE,
        operation = %operation,
        duration_ms,
        "Performance metrics"
    );
}

/// Security-relevant event. Logged at warn so it lands in `security.log`.
pub fn security(event: &str, ip: Option<IpAddr>, details: &Value) {
    tracing::warn!(
        category = "security",
        service = SERVICE,
        event = %event,
        ip = ?ip,
        details = %details,
        "Security event"
    );
}

/// Completed HTTP request.
pub fn request(
    method: &str,
    url: &str,
    status: u16,
    response_time_ms: f64,
    user_agent: Option<&str>,
    ip: Option<IpAddr>,
) {
    tracing::info!(
        category = "http",
        service = SERVICE,
        method = %method,
        url = %url,
        status,
        response_time_ms,
        user_agent = user_agent.unwrap_or(""),
        ip = ?ip,
        "HTTP Request"
    );
}

/// Data-store operation (probe, query).
pub fn database(operation: &str, collection: &str, duration_ms: f64) {
    tracing::info!(
        category = "database",
        service = SERVICE,
        operation = %operation,
        collection = %collection,
        duration_ms,
        "Database operation"
    );
}

/// Authentication outcome.
pub fn auth(event: &str, principal: Option<&str>) {
    tracing::info!(
        category = "authentication",
        service = SERVICE,
        event = %event,
        principal = principal.unwrap_or("anonymous"),
        "Authentication event"
    );
}

/// Domain event (todo created, deleted, ...).
pub fn business(event: &str, details: &Value) {
    tracing::info!(
        category = "business",
        service = SERVICE,
        event = %event,
        details = %details,
        "Business event"
    );
}

/// Error with its source chain flattened into the event.
pub fn enhanced_error(message: &str, error: &(dyn std::error::Error + 'static)) {
    let mut chain = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    tracing::error!(
        category = "error",
        service = SERVICE,
        error = %error,
        causes = ?chain,
        "{}",
        message
    );
}
