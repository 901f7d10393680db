//! Common configuration types and helpers for the call client crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Default log filter when `RUST_LOG` is not set. Matches the `call.*`
/// tracing targets and the `call_client` module paths.
pub const DEFAULT_LOG_FILTER: &str = "call=info";

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g., `call.controller=debug`)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
    /// Install a Prometheus metrics recorder
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
            metrics_enabled: false,
        }
    }
}

/// Errors raised while reading configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Read a required, non-blank variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if the key is absent or blank.
pub fn required_var(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an optional variable, falling back to `default` when absent. A
/// present but unparseable value is an error.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if the value cannot be parsed.
pub fn parsed_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        }),
    }
}
