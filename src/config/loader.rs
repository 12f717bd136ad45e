//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration for process startup.
///
/// Reads the TOML file when one is given, falls back to defaults otherwise,
/// then applies environment overrides and validates the result.
pub fn load_startup_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT`, `NODE_ENV`, `LOG_LEVEL`, `ALLOWED_ORIGINS` and `MONGODB_URI`.
///
/// `APP_ENV` is accepted as an alias; `NODE_ENV` wins when both are set.
///
/// `lookup` abstracts the environment so overrides can be tested without
/// mutating process state.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            value: port.clone(),
        })?;
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{}", port),
        };
    }

    let environment = lookup("NODE_ENV")
        .map(|value| ("NODE_ENV", value))
        .or_else(|| lookup("APP_ENV").map(|value| ("APP_ENV", value)));
    if let Some((var, env)) = environment {
        config.environment = env.parse().map_err(|_| ConfigError::Env {
            var,
            value: env.clone(),
        })?;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        if !level.trim().is_empty() {
            config.observability.log_level = Some(level.trim().to_string());
        }
    }

    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.security.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(uri) = lookup("MONGODB_URI") {
        config.database.uri = uri;
    }

    Ok(())
}
