//! Configuration module for the points ledger.
//!
//! Configuration is built once at startup and handed to the components that
//! need it. Two sources are supported:
//!
//! - a YAML file with `${VAR}` / `${VAR:-default}` interpolation
//! - defaults plus environment overrides (`RUN_ADDRESS`, `DATABASE_URI`, ...)
//!
//! # Usage
//!
//! ```rust,ignore
//! use points_ledger::config::{Config, load_config};
//!
//! let config = load_config(Some("ledger.yaml"))?;
//! let config = Config::from_env()?;
//! ```

mod accrual;
mod auth;
mod observability;
mod persistence;
mod reconciliation;
mod server;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use accrual::AccrualConfig;
pub use auth::AuthConfig;
pub use observability::ObservabilityConfig;
pub use persistence::PersistenceConfig;
pub use reconciliation::ReconciliationConfig;
pub use server::ServerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnvVar {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Ledger database.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Accrual system client.
    #[serde(default)]
    pub accrual: AccrualConfig,
    /// Background reconciliation.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Gateway trust.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Metrics exporter.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`, validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Apply environment-style overrides. Unset or empty variables are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RUN_ADDRESS") {
            self.server.run_address = v;
        }
        if let Some(v) = get("DATABASE_URI") {
            self.persistence.database_uri = v;
        }
        if let Some(v) = get("ACCRUAL_SYSTEM_ADDRESS") {
            self.accrual.address = v;
        }
        if let Some(v) = get("SECRET_KEY") {
            self.auth.secret = v;
        }
        if let Some(v) = get("ACCRUAL_TIMEOUT_MS") {
            self.accrual.timeout_ms = parse_var("ACCRUAL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("RECONCILIATION_INTERVAL_MS") {
            self.reconciliation.interval_ms = parse_var("RECONCILIATION_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("RECONCILIATION_MAX_CONCURRENCY") {
            self.reconciliation.max_concurrency =
                parse_var("RECONCILIATION_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("RECONCILIATION_BATCH_SIZE") {
            self.reconciliation.batch_size = parse_var("RECONCILIATION_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("METRICS_PORT") {
            self.observability.metrics_port = parse_var("METRICS_PORT", &v)?;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar {
            name,
            value: value.to_string(),
        })
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// `path` defaults to `ledger.yaml`.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("ledger.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}`; unset variables without a
/// default become empty.
#[allow(clippy::expect_used)] // constant pattern
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let default_value = caps.get(2).map_or("", |m| m.as_str());
        match std::env::var(&caps[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.run_address.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "server.run_address must not be empty".to_string(),
        ));
    }

    if config.persistence.database_uri.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "persistence.database_uri must not be empty".to_string(),
        ));
    }

    let address = config.accrual.address.trim();
    if !(address.starts_with("http://") || address.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "accrual.address must be an http(s) URL, got '{address}'"
        )));
    }

    if config.accrual.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "accrual.timeout_ms must be positive".to_string(),
        ));
    }

    let reconciliation = &config.reconciliation;
    if reconciliation.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.interval_ms must be positive".to_string(),
        ));
    }
    if reconciliation.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.max_concurrency must be positive".to_string(),
        ));
    }
    if reconciliation.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.batch_size must be positive".to_string(),
        ));
    }

    Ok(())
}
