use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid base_url: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Invalid {0}: must be greater than 0")]
    ZeroDuration(&'static str),

    #[error("Invalid requests_per_second: {0}. Must be at least 1")]
    InvalidRateLimit(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid window_days: {0}. Must be between 1 and 366")]
    InvalidWindowDays(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .migdash/config.yaml (project config)
    /// 3. .migdash/local.yaml (local overrides, optional)
    /// 4. Environment variables (MIGDASH_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_with(None)
    }

    /// Like [`ConfigLoader::load`], with an extra file merged after the
    /// project files and before the environment.
    pub fn load_with(extra: Option<&Path>) -> Result<Config> {
        let config: Config = Self::figment(extra)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(extra: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".migdash/config.yaml"))
            .merge(Yaml::file(".migdash/local.yaml"));
        if let Some(path) = extra {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("MIGDASH_").split("__"))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
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

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let base_url = &config.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.clone()));
        }

        if config.api.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(config.api.requests_per_second));
        }

        let durations = [
            ("api.timeout_secs", config.api.timeout_secs),
            ("checks.confirm_timeout_secs", config.checks.confirm_timeout_secs),
            ("checks.refresh_timeout_secs", config.checks.refresh_timeout_secs),
            ("checks.completion_poll_ms", config.checks.completion_poll_ms),
            ("refresh.poll_interval_secs", config.refresh.poll_interval_secs),
            ("refresh.initial_backoff_ms", config.refresh.initial_backoff_ms),
            ("refresh.max_elapsed_ms", config.refresh.max_elapsed_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDuration(*name));
        }

        if config.refresh.initial_backoff_ms >= config.refresh.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.refresh.initial_backoff_ms,
                config.refresh.max_backoff_ms,
            ));
        }

        if !(1..=366).contains(&config.reporting.window_days) {
            return Err(ConfigError::InvalidWindowDays(config.reporting.window_days));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.requests_per_second, 10);
        assert_eq!(config.checks.confirm_timeout_secs, 120);
        assert_eq!(config.reporting.window_days, 7);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
api:
  base_url: https://migrations.internal
  requests_per_second: 4
checks:
  confirm_timeout_secs: 300
reporting:
  window_days: 14
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.api.base_url, "https://migrations.internal");
        assert_eq!(config.api.requests_per_second, 4);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.checks.confirm_timeout_secs, 300);
        assert_eq!(config.checks.refresh_timeout_secs, 15);
        assert_eq!(config.reporting.window_days, 14);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "localhost:8000".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.api.requests_per_second = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(0))
        ));
    }

    #[test]
    fn test_validate_zero_confirm_timeout() {
        let mut config = Config::default();
        config.checks.confirm_timeout_secs = 0;
        match ConfigLoader::validate(&config) {
            Err(ConfigError::ZeroDuration(name)) => assert_eq!(name, "checks.confirm_timeout_secs"),
            other => panic!("Expected ZeroDuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.refresh.initial_backoff_ms = 5000;
        config.refresh.max_backoff_ms = 1000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(5000, 1000))
        ));
    }

    #[test]
    fn test_validate_window_days() {
        let mut config = Config::default();
        config.reporting.window_days = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWindowDays(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_settings() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let file = yaml_file("api:\n  base_url: http://from-file:8000\n");
        temp_env::with_vars(
            [
                ("MIGDASH_API__BASE_URL", Some("http://from-env:9000")),
                ("MIGDASH_REPORTING__WINDOW_DAYS", Some("30")),
            ],
            || {
                let config = ConfigLoader::load_with(Some(file.path())).unwrap();
                assert_eq!(config.api.base_url, "http://from-env:9000", "Env should win");
                assert_eq!(config.reporting.window_days, 30);
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let base_file = yaml_file("api:\n  timeout_secs: 10\nlogging:\n  level: info\n  format: json\n");
        let override_file = yaml_file("api:\n  timeout_secs: 45\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.api.timeout_secs, 45, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = yaml_file("reporting:\n  window_days: 400\n");
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
