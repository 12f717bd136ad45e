//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, caps consistent, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{AppConfig, Environment, ProbeMode};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("security.audit.retain_entries ({retain}) must not exceed max_entries ({max})")]
    AuditRetention { max: usize, retain: usize },

    #[error("security.cors.allowed_origins contains an invalid origin: '{0}'")]
    InvalidOrigin(String),

    #[error("database.uri is not a valid URL: '{0}'")]
    InvalidDatabaseUri(String),

    #[error("performance.thresholds.{0} must be between 0 and 1")]
    FractionOutOfRange(&'static str),

    #[error("admin.api_key must be changed from the placeholder in production")]
    PlaceholderAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }
    if config.admin.enabled {
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
        if config.environment == Environment::Production
            && config.admin.api_key == "CHANGE_ME_IN_PRODUCTION"
        {
            errors.push(ValidationError::PlaceholderAdminKey);
        }
    }

    let security = &config.security;
    if security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }
    if security.ip_blocking.max_failed_attempts == 0 {
        errors.push(ValidationError::Zero("security.ip_blocking.max_failed_attempts"));
    }
    if security.ip_blocking.block_duration_ms == 0 {
        errors.push(ValidationError::Zero("security.ip_blocking.block_duration_ms"));
    }
    if security.audit.max_entries == 0 {
        errors.push(ValidationError::Zero("security.audit.max_entries"));
    }
    if security.audit.retain_entries > security.audit.max_entries {
        errors.push(ValidationError::AuditRetention {
            max: security.audit.max_entries,
            retain: security.audit.retain_entries,
        });
    }
    if security.rate_limit.enabled {
        if security.rate_limit.window_ms == 0 {
            errors.push(ValidationError::Zero("security.rate_limit.window_ms"));
        }
        if security.rate_limit.max_requests == 0 {
            errors.push(ValidationError::Zero("security.rate_limit.max_requests"));
        }
    }
    for origin in &security.cors.allowed_origins {
        if axum::http::HeaderValue::from_str(origin).is_err() || Url::parse(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
    if security.cleanup_interval_secs == 0 {
        errors.push(ValidationError::Zero("security.cleanup_interval_secs"));
    }

    if config.database.probe == ProbeMode::Tcp && Url::parse(&config.database.uri).is_err() {
        errors.push(ValidationError::InvalidDatabaseUri(config.database.uri.clone()));
    }

    let perf = &config.performance;
    if perf.max_history == 0 {
        errors.push(ValidationError::Zero("performance.max_history"));
    }
    if perf.cleanup_interval_secs == 0 {
        errors.push(ValidationError::Zero("performance.cleanup_interval_secs"));
    }
    if perf.system_sample_interval_secs == 0 {
        errors.push(ValidationError::Zero("performance.system_sample_interval_secs"));
    }
    for (name, value) in [
        ("error_rate", perf.thresholds.error_rate),
        ("memory_usage", perf.thresholds.memory_usage),
        ("cpu_usage", perf.thresholds.cpu_usage),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::FractionOutOfRange(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.security.audit.retain_entries = 20_000;
        config.security.rate_limit.max_requests = 0;
        config.security.cors.allowed_origins.push("not an origin".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::AuditRetention {
            max: 10_000,
            retain: 20_000
        }));
        assert!(errors.contains(&ValidationError::Zero("security.rate_limit.max_requests")));
    }

    #[test]
    fn placeholder_admin_key_rejected_in_production() {
        let mut config = AppConfig::default();
        config.environment = Environment::Production;
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PlaceholderAdminKey]);
    }
}
