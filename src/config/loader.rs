//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Sources are merged in precedence order: base file, environment override
//! file, then `STRATUM__`-prefixed environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::StratumConfig;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "stratum.toml";
const ENV_PREFIX: &str = "STRATUM";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: StratumConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_internal(config_dir, environment, None)
    }

    /// Load configuration with an explicit map standing in for the process
    /// environment. Keys use the `STRATUM__SECTION__FIELD` form.
    pub fn load_with_env_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_internal(config_dir, environment, Some(overrides))
    }

    fn load_internal(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_source: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment, env_source)?;
        config.validate()?;

        info!(
            environment = %environment,
            eager_singletons = config.container.eager_singletons,
            default_manager = config.transaction.default_manager_name.as_deref(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        env_source: Option<HashMap<String, String>>,
    ) -> ConfigResult<StratumConfig> {
        let mut builder = config::Config::builder();

        let base_path = config_directory.join(BASE_FILE);
        if base_path.is_file() {
            builder = builder.add_source(config::File::from(base_path.as_path()).required(true));
        } else {
            debug!(
                "No base configuration at {}, using defaults",
                base_path.display()
            );
        }

        let override_path = config_directory.join(format!("stratum.{environment}.toml"));
        builder = builder.add_source(config::File::from(override_path.as_path()).required(false));

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env_source),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigurationError::load_error(config_directory.display().to_string(), e))?;

        Ok(settings.try_deserialize::<StratumConfig>()?)
    }

    /// Detect the active environment
    pub fn detect_environment() -> String {
        env::var("STRATUM_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("STRATUM_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StratumConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
