use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::ReminderPolicy;

/// Upper bound for `trust_scaling.max_factor`.
const MAX_TRUST_FACTOR: f64 = 10.0;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error(
        "Invalid trust scaling: min_factor ({0}) must be positive and at most max_factor ({1}), which may not exceed 10"
    )]
    InvalidTrustScaling(f64, f64),

    #[error("Invalid {field}: must be positive")]
    NonPositive { field: &'static str },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// A file that only carries the policy section.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policy: ReminderPolicy,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .claimwatch/config.yaml (project config, created by init)
    /// 3. .claimwatch/local.yaml (local overrides, optional)
    /// 4. Environment variables (CLAIMWATCH_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".claimwatch/config.yaml"))
            .merge(Yaml::file(".claimwatch/local.yaml"))
            .merge(Env::prefixed("CLAIMWATCH_").split("__"))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CLAIMWATCH_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Read only the `policy` section of a config file.
    ///
    /// Used by the daemon to pick up edited defaults without a restart.
    pub fn load_policy_from_file(path: impl AsRef<Path>) -> Result<ReminderPolicy> {
        let path = path.as_ref();
        let file: PolicyFile = Figment::new()
            .merge(Yaml::file(path))
            .extract()
            .context(format!("Failed to load policy from {}", path.display()))?;

        file.policy
            .validate()
            .map_err(|e| ConfigError::InvalidPolicy(e.to_string()))?;
        Ok(file.policy)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
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
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        config
            .policy
            .validate()
            .map_err(|e| ConfigError::InvalidPolicy(e.to_string()))?;

        let scaling = &config.trust_scaling;
        if !(scaling.min_factor > 0.0
            && scaling.min_factor <= scaling.max_factor
            && scaling.max_factor <= MAX_TRUST_FACTOR)
        {
            return Err(ConfigError::InvalidTrustScaling(
                scaling.min_factor,
                scaling.max_factor,
            ));
        }

        let scoring = &config.scoring;
        if !(0.0..=1.0).contains(&scoring.prior) {
            return Err(ConfigError::ValidationFailed(format!(
                "scoring.prior must be within [0, 1], got {}",
                scoring.prior
            )));
        }
        if scoring.completion_weight < 0.0
            || scoring.responsiveness_weight < 0.0
            || scoring.completion_weight + scoring.responsiveness_weight <= 0.0
        {
            return Err(ConfigError::ValidationFailed(
                "scoring weights must be non-negative and not both zero".to_string(),
            ));
        }
        if scoring.tau_hours <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "scoring.tau_hours",
            });
        }
        if scoring.volume_threshold == 0 {
            return Err(ConfigError::NonPositive {
                field: "scoring.volume_threshold",
            });
        }

        let scheduler = &config.scheduler;
        let positive = [
            ("scheduler.tick_interval_secs", scheduler.tick_interval_secs),
            ("scheduler.assignment_timeout_secs", scheduler.assignment_timeout_secs),
            ("scheduler.sweep_deadline_secs", scheduler.sweep_deadline_secs),
            ("scheduler.score_refresh_interval_secs", scheduler.score_refresh_interval_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        if scheduler.concurrency_limit == 0 {
            return Err(ConfigError::NonPositive {
                field: "scheduler.concurrency_limit",
            });
        }
        if scheduler.max_consecutive_failures == 0 {
            return Err(ConfigError::NonPositive {
                field: "scheduler.max_consecutive_failures",
            });
        }

        if config.dispatch.batch_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "dispatch.batch_size",
            });
        }
        if config.dispatch.max_delivery_attempts == 0 {
            return Err(ConfigError::NonPositive {
                field: "dispatch.max_delivery_attempts",
            });
        }

        if config.github.requests_per_hour == 0 {
            return Err(ConfigError::NonPositive {
                field: "github.requests_per_hour",
            });
        }
        if config.github.api_base.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "github.api_base cannot be empty".to_string(),
            ));
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
        assert_eq!(config.database.path, ".claimwatch/claimwatch.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.policy.grace_period_hours, 72);
        assert_eq!(config.policy.warning_window_hours, 24);
        assert_eq!(config.server.port, 8080);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 5
logging:
  level: debug
  format: pretty
policy:
  grace_period_hours: 48
  max_reminders: 2
scheduler:
  concurrency_limit: 4
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.policy.grace_period_hours, 48);
        assert_eq!(config.policy.inactivity_window_hours, 72);
        assert_eq!(config.policy.max_reminders, 2);
        assert_eq!(config.scheduler.concurrency_limit, 4);
        assert_eq!(config.scheduler.tick_interval_secs, 3600);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBackoff(30000, 10000)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let mut config = Config::default();
        config.policy.warning_window_hours = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidPolicy(_)
        ));

        let mut config = Config::default();
        config.policy.max_reminders = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidPolicy(_)
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_trust_scaling() {
        let mut config = Config::default();
        config.trust_scaling.min_factor = 2.0;
        config.trust_scaling.max_factor = 1.0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTrustScaling(_, _)
        ));
    }

    #[test]
    fn test_validate_rejects_runaway_trust_factor() {
        let mut config = Config::default();
        config.trust_scaling.max_factor = 1e12;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTrustScaling(_, _)
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_policy_window() {
        let mut config = Config::default();
        config.policy.grace_period_hours = 3_000_000_000;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidPolicy(_)
        ));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.scheduler.concurrency_limit = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::NonPositive {
                field: "scheduler.concurrency_limit"
            }
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let file = yaml_file("logging:\n  level: warn\n  format: pretty\npolicy:\n  grace_period_hours: 24\n");

        temp_env::with_vars(
            [
                ("CLAIMWATCH_POLICY__MAX_REMINDERS", Some("3")),
                ("CLAIMWATCH_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.logging.level, "debug", "env should win over file");
                assert_eq!(config.logging.format, "pretty");
                assert_eq!(config.policy.grace_period_hours, 24);
                assert_eq!(config.policy.max_reminders, 3);
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let file = yaml_file("policy:\n  inactivity_window_hours: -1\n");
        temp_env::with_vars_unset(["CLAIMWATCH_POLICY__INACTIVITY_WINDOW_HOURS"], || {
            assert!(ConfigLoader::load_from_file(file.path()).is_err());
        });
    }

    #[test]
    fn test_load_policy_from_file() {
        let file = yaml_file("database:\n  path: ignored.db\npolicy:\n  warning_window_hours: 12\n");
        let policy = ConfigLoader::load_policy_from_file(file.path()).unwrap();
        assert_eq!(policy.warning_window_hours, 12);
        assert_eq!(policy.grace_period_hours, 72);

        let bad = yaml_file("policy:\n  max_reminders: 0\n");
        assert!(ConfigLoader::load_policy_from_file(bad.path()).is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let base_file = yaml_file("logging:\n  level: info\n  format: json\nserver:\n  port: 9000\n");
        let override_file = yaml_file("logging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "Override should win");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
        assert_eq!(config.server.port, 9000);
    }
}
