//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$RENTLEDGER_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rentledger/config.toml`
//! 3. `~/.rentledger/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the log level must parse as a filter directive).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration.
///
/// # Example
///
/// ```toml
/// log_level = "info"
///
/// [protocol]
/// sink = "file"
/// path = "/var/lib/rentledger/protocol.jsonl"
///
/// [ledger]
/// default_daily_rate = 300
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Log filter directive (e.g. "warn", "rentledger=debug")
    pub log_level: Option<String>,

    /// Protocol sink settings
    pub protocol: Option<ProtocolConfig>,

    /// Ledger defaults
    pub ledger: Option<LedgerDefaults>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.log_level {
            if level.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "log_level cannot be empty".to_string(),
                ));
            }
            tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid log_level '{}': {}", level, e))
            })?;
        }

        if let Some(protocol) = &self.protocol {
            protocol.validate()?;
        }

        if let Some(ledger) = &self.ledger {
            ledger.validate()?;
        }

        Ok(())
    }
}

/// Protocol sink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Sink to use ("log", "file" or "none")
    pub sink: Option<String>,

    /// Target file for the "file" sink
    pub path: Option<PathBuf>,
}

impl ProtocolConfig {
    /// Valid sink names.
    pub const VALID_SINKS: &'static [&'static str] = &["log", "file", "none"];

    /// Validate the protocol configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sink) = &self.sink {
            if !Self::VALID_SINKS.contains(&sink.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid protocol sink '{}', must be one of: {}",
                    sink,
                    Self::VALID_SINKS.join(", ")
                )));
            }
            if sink == "file" && self.path.is_none() {
                return Err(ConfigError::InvalidValue(
                    "protocol sink 'file' requires a path".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Ledger defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerDefaults {
    /// Daily rate in minor currency units for items without their own rate
    pub default_daily_rate: Option<i64>,
}

impl LedgerDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rate) = self.default_daily_rate {
            if rate <= 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "default_daily_rate must be positive, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}
