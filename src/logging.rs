//! # Structured Logging Module
//!
//! Environment-aware structured logging for container bootstrap and
//! transactional interception. Console output is human readable by default
//! and switches to JSON when the loaded `[logging]` section or
//! `STRATUM_LOG_FORMAT` asks for it.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Level and output format the subscriber is built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl LogSettings {
    /// Resolve settings from an optional `[logging]` section.
    ///
    /// `STRATUM_LOG_FORMAT` overrides the configured format. Without a
    /// section the level follows the environment.
    pub fn resolve(config: Option<&LoggingConfig>) -> Self {
        Self::resolve_with(config, &get_environment(), get_log_format().as_deref())
    }

    fn resolve_with(config: Option<&LoggingConfig>, environment: &str, format_override: Option<&str>) -> Self {
        let level = config.map_or_else(|| get_log_level(environment), |config| config.level.clone());
        let format = format_override.or(config.map(|config| config.format.as_str()));
        Self {
            level,
            json: format == Some("json"),
        }
    }
}

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    init_with_settings(LogSettings::resolve(None));
}

/// Initialize structured logging from a loaded `[logging]` section.
/// `RUST_LOG` and `STRATUM_LOG_FORMAT` still take precedence.
pub fn init_structured_logging_with(config: &LoggingConfig) {
    init_with_settings(LogSettings::resolve(Some(config)));
}

fn init_with_settings(settings: LogSettings) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let LogSettings { level: log_level, json } = settings;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console_layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        // Use try_init so an embedding application can own the global subscriber
        if tracing_subscriber::registry()
            .with(console_layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("STRATUM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn get_log_format() -> Option<String> {
    std::env::var("STRATUM_LOG_FORMAT")
        .ok()
        .map(|format| format.to_lowercase())
}

/// Log structured data for registry pipeline phases
pub fn log_pipeline_phase(phase: &str, tier: &str, count: usize, details: Option<&str>) {
    tracing::info!(
        phase = %phase,
        tier = %tier,
        count = count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧩 PIPELINE_PHASE"
    );
}

/// Log structured data for lifecycle interceptor registration
pub fn log_interceptor_registration(
    operation: &str,
    name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        name = name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔗 INTERCEPTOR_REGISTRATION"
    );
}

/// Log structured data for transaction demarcation
pub fn log_transaction_operation(
    operation: &str,
    joinpoint: &str,
    transaction_name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        joinpoint = %joinpoint,
        transaction_name = transaction_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "💳 TRANSACTION_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
    }

    #[test]
    fn test_configured_level_and_format_are_used() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "json".to_string(),
        };
        let settings = LogSettings::resolve_with(Some(&config), "development", None);
        assert_eq!(
            settings,
            LogSettings {
                level: "warn".to_string(),
                json: true
            }
        );
    }

    #[test]
    fn test_format_override_beats_configuration() {
        let config = LoggingConfig {
            level: "error".to_string(),
            format: "json".to_string(),
        };
        let settings = LogSettings::resolve_with(Some(&config), "production", Some("pretty"));
        assert_eq!(settings.level, "error");
        assert!(!settings.json);
    }

    #[test]
    fn test_without_configuration_level_follows_environment() {
        let settings = LogSettings::resolve_with(None, "production", Some("json"));
        assert_eq!(settings.level, "info");
        assert!(settings.json);
        assert!(!LogSettings::resolve_with(None, "test", None).json);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging_with(&LoggingConfig::default());
        init_structured_logging();
        init_structured_logging();
        log_pipeline_phase("registry", "priority_ordered", 0, None);
    }
}
