//! Gate configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [retry]
//! max_attempts = 4
//! initial_delay_ms = 10
//! factor = 5.0
//! jitter = 0.1
//! max_delay_ms = 1000
//!
//! [logging]
//! level = "info,dgate_core=debug"
//! format = "json"
//! ```

use crate::error::ConfigError;
use dgate_retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Conflict retry settings
    pub retry: RetryConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry settings
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or a validation error.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if unreadable, otherwise as [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded gate config");
        Self::from_toml_str(&input)
    }

    /// Check settings are consistent
    ///
    /// # Errors
    /// [`ConfigError::Retry`] for an unusable backoff,
    /// [`ConfigError::LogFilter`] for a malformed log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.to_policy()?;
        self.logging.filter()?;
        Ok(())
    }
}

/// Conflict retry settings
///
/// Defaults: 4 attempts, delays of 10ms × 5ⁿ with 10% jitter, no cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first conflict
    pub initial_delay_ms: u64,
    /// Growth factor between delays
    pub factor: f64,
    /// Random extra delay as a fraction of the base delay
    pub jitter: f64,
    /// Upper bound on any single delay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl RetryConfig {
    /// Build a validated retry policy
    ///
    /// # Errors
    /// [`ConfigError::Retry`] if the policy is unusable.
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::new(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_factor(self.factor)
            .with_jitter(self.jitter);
        if let Some(max) = self.max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max));
        }
        policy.validate()?;
        Ok(policy)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 10,
            factor: 5.0,
            jitter: 0.1,
            max_delay_ms: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl LoggingConfig {
    /// With filter directive
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// With output format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Parse the configured directive
    ///
    /// # Errors
    /// [`ConfigError::LogFilter`] if the directive is malformed.
    pub fn filter(&self) -> Result<tracing_subscriber::EnvFilter, ConfigError> {
        tracing_subscriber::EnvFilter::try_new(&self.level).map_err(|source| {
            ConfigError::LogFilter {
                directive: self.level.clone(),
                source,
            }
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
