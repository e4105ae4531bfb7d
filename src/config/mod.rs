//! # Configuration Management
//!
//! Typed configuration for container bootstrap and transactional
//! interception, layered from `config/stratum.toml`, an optional
//! per-environment override file, and `STRATUM__*` environment variables.
//!
//! ```rust,no_run
//! use stratum_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! println!("eager singletons: {}", manager.config().container.eager_singletons);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure mirroring `config/stratum.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    pub container: ContainerConfig,
    pub transaction: TransactionConfig,
    pub logging: LoggingConfig,
}

/// Bootstrap behavior of the component container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Pre-instantiate every non-lazy singleton once interceptors are installed
    pub eager_singletons: bool,
    /// Log an advisory for instances created before the interceptor chain is complete
    pub early_instance_advisories: bool,
    /// Register the built-in configuration processor before running the pipeline
    pub register_configuration_processor: bool,
    /// Registration name of the built-in configuration processor
    pub configuration_processor_name: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            eager_singletons: true,
            early_instance_advisories: true,
            register_configuration_processor: true,
            configuration_processor_name: names::CONFIGURATION_PROCESSOR.to_string(),
        }
    }
}

/// Defaults applied by the transaction interceptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Manager looked up by name when an attribute carries no qualifier
    pub default_manager_name: Option<String>,
    /// Timeout applied to attributes that declare none
    pub default_timeout_seconds: Option<u64>,
}

impl TransactionConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `"pretty"` or `"json"`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl StratumConfig {
    /// Validate cross-field constraints that deserialization cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.container.configuration_processor_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "container.configuration_processor_name",
                self.container.configuration_processor_name.clone(),
                "must not be blank",
            ));
        }

        if let Some(name) = &self.transaction.default_manager_name {
            if name.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "transaction.default_manager_name",
                    name.clone(),
                    "must not be blank when present",
                ));
            }
        }

        if self.transaction.default_timeout_seconds == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "transaction.default_timeout_seconds",
                "0",
                "must be greater than zero; omit it for no timeout",
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigurationError::invalid_value(
                    "logging.format",
                    other,
                    "expected 'pretty' or 'json'",
                ))
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigurationError::invalid_value(
                "logging.level",
                other,
                "expected one of trace, debug, info, warn, error",
            )),
        }
    }
}
