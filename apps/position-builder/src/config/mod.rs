//! Configuration module for the position builder.
//!
//! YAML configuration with `${VAR}` / `${VAR:-default}` environment variable
//! interpolation. Every section has defaults, so an empty file is valid.
//!
//! # Usage
//!
//! ```rust,ignore
//! use position_builder::config::{load_config_or_default, ConfigOrigin};
//!
//! let (config, origin) = load_config_or_default(Some("config.yaml"))?;
//! println!("refresh every {}s", config.refresh.interval_secs);
//! ```

mod observability;
mod payoff;
mod quote_source;
mod refresh;
mod underlying;

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use payoff::PayoffConfig;
pub use quote_source::QuoteSourceConfig;
pub use refresh::RefreshConfig;
pub use underlying::UnderlyingConfig;

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Largest payoff grid the chart is computed over.
pub const MAX_PAYOFF_STEPS: u32 = 10_000;

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

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Underlying instrument.
    #[serde(default)]
    pub underlying: UnderlyingConfig,
    /// Periodic refresh.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Payoff chart window.
    #[serde(default)]
    pub payoff: PayoffConfig,
    /// Quote source.
    #[serde(default)]
    pub quote_source: QuoteSourceConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parsed metrics listener address.
    ///
    /// # Errors
    ///
    /// `ValidationError` if the address does not parse.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = &self.observability.metrics.listen_addr;
        addr.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "observability.metrics.listen_addr is not a socket address: {addr}"
            ))
        })
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from this file.
    File(String),
    /// File was missing; built-in defaults used.
    Defaults(String),
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration, falling back to defaults when the file does not exist.
///
/// The caller logs the fallback; tracing is usually not set up yet when
/// configuration is read.
///
/// # Errors
///
/// Returns a `ConfigError` if an existing file cannot be read, parsed, or validated.
pub fn load_config_or_default(path: Option<&str>) -> Result<(Config, ConfigOrigin), ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH).to_string();
    match load_config(Some(&path)) {
        Ok(config) => Ok((config, ConfigOrigin::File(path))),
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok((Config::default(), ConfigOrigin::Defaults(path)))
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.underlying.symbol.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "underlying.symbol must not be empty".to_string(),
        ));
    }

    if config.refresh.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "refresh.interval_secs must be positive".to_string(),
        ));
    }

    let padding = config.payoff.padding_ratio;
    if !(0.0..1.0).contains(&padding) {
        return Err(ConfigError::ValidationError(
            "payoff.padding_ratio must be in [0.0, 1.0)".to_string(),
        ));
    }

    if config.payoff.steps == 0 {
        return Err(ConfigError::ValidationError(
            "payoff.steps must be positive".to_string(),
        ));
    }

    if config.payoff.steps > MAX_PAYOFF_STEPS {
        return Err(ConfigError::ValidationError(format!(
            "payoff.steps must be at most {MAX_PAYOFF_STEPS}"
        )));
    }

    if config.quote_source.chain_file.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "quote_source.chain_file must not be empty".to_string(),
        ));
    }

    let valid_formats = ["pretty", "json"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    if config.observability.metrics.enabled {
        config.metrics_addr()?;
    }

    Ok(())
}
