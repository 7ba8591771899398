use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid merge window: {0}s. Must be at least 1")]
    InvalidMergeWindow(u64),

    #[error("Invalid sample interval: {0}ms. Must be at least 1")]
    InvalidSampleInterval(u64),

    #[error("Invalid verification window: {0}s. Must be at least 1")]
    InvalidVerificationWindow(u64),

    #[error("Invalid bus capacity: {0}. Must be at least 1")]
    InvalidBusCapacity(usize),

    #[error("Invalid LLM rate limit: {0}. Must be positive")]
    InvalidLlmRateLimit(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .chronos/config.yaml (project config)
    /// 3. .chronos/local.yaml (local overrides, optional)
    /// 4. Environment variables (CHRONOS_* prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".chronos/config.yaml"))
            .merge(Yaml::file(".chronos/local.yaml"))
            .merge(Env::prefixed("CHRONOS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.merge.window_secs == 0 {
            return Err(ConfigError::InvalidMergeWindow(config.merge.window_secs));
        }

        if config.verification.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidSampleInterval(
                config.verification.sample_interval_ms,
            ));
        }

        if config.verification.default_window_seconds == 0 {
            return Err(ConfigError::InvalidVerificationWindow(
                config.verification.default_window_seconds,
            ));
        }

        if config.bus.channel_capacity == 0 {
            return Err(ConfigError::InvalidBusCapacity(config.bus.channel_capacity));
        }

        if config.llm.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidLlmRateLimit(
                config.llm.requests_per_second,
            ));
        }

        if config.llm.initial_backoff_ms > config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::StrategyMode;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mode: AGENTIC\nmerge:\n  window_secs: 4\nverification:\n  sample_interval_ms: 250"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.mode, StrategyMode::Agentic);
        assert_eq!(config.merge.window_secs, 4);
        assert_eq!(config.verification.sample_interval_ms, 250);
        // Untouched sections keep defaults.
        assert_eq!(config.bus.channel_capacity, 1024);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.merge.window_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMergeWindow(0))
        ));

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("CHRONOS_MODE", Some("LLM")),
                ("CHRONOS_MERGE__WINDOW_SECS", Some("7")),
            ],
            || {
                let config = ConfigLoader::load().unwrap();
                assert_eq!(config.mode, StrategyMode::Llm);
                assert_eq!(config.merge.window_secs, 7);
            },
        );
    }
}
