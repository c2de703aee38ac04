//! Configuration management for thermolog
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use thermolog::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Logging to: {}", config.storage.root.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `THERMOLOG__<section>__<key>`
//!
//! Examples:
//! - `THERMOLOG__STORAGE__ROOT=/mnt/sdcard`
//! - `THERMOLOG__TIME__SOURCE=system`
//! - `THERMOLOG__TIME__RESYNC_INTERVAL=12h`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/thermolog.toml`.
//! This can be overridden using the `THERMOLOG_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, JobConfig, SensorsConfig, StatusConfig, StorageConfig, TimeConfig, TimeSourceKind,
};
pub use sources::config_path;
pub use validation::ValidationError;

use crate::clock::{TimeSettings, TzRule};
use crate::store::StreamDescriptor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`THERMOLOG__*`)
    /// 2. TOML file (default: `config/thermolog.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Timezone rule, already checked by validation
    pub fn tz_rule(&self) -> Result<TzRule, ValidationError> {
        self.time
            .timezone
            .parse()
            .map_err(|source| ValidationError::InvalidTimezone {
                timezone: self.time.timezone.clone(),
                source,
            })
    }

    /// Settings for the [`TimeService`](crate::clock::TimeService)
    pub fn time_settings(&self) -> Result<TimeSettings, ValidationError> {
        Ok(TimeSettings {
            servers: self.time.servers.clone(),
            tz: self.tz_rule()?,
            max_attempts: self.time.max_attempts,
            propagation_delay: self.time.propagation_delay.as_duration(),
        })
    }

    /// Stream descriptor for a configured job, rooted at `storage.root`
    pub fn stream_for(&self, job: &JobConfig) -> StreamDescriptor {
        StreamDescriptor::new(self.storage.root.join(&job.base_dir), job.include_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
root = "/tmp/thermolog"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(
            config.storage.error_log_path(),
            PathBuf::from("/tmp/thermolog/error_log.txt")
        );
    }

    #[test]
    fn test_validation_catches_bad_timezone() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[time]
timezone = "CET-1CEST,M13.5.0,M10.5.0/3"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidTimezone { .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
root = "/sdcard"
error_log = "error_log.txt"
sync_writes = true

[time]
source = "sntp"
servers = ["0.cz.pool.ntp.org", "time.nist.gov"]
timezone = "CET-1CEST,M3.5.0,M10.5.0/3"
max_attempts = 3
propagation_delay = "100ms"
query_timeout = "5s"
max_stratum = 3
resync_interval = "24h"

[sensors]
channels = ["teplota_senzor_1", "teplota_senzor_2"]

[jobs.data]
base_dir = "data"
include_seconds = true
interval = "10s"

[jobs.chart]
base_dir = "chartData"
include_seconds = false
interval = "10m"

[status]
bind_addr = "127.0.0.1:8080"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.time.servers.len(), 2);
        assert_eq!(config.sensors.channels, vec!["teplota_senzor_1", "teplota_senzor_2"]);
        assert_eq!(config.status.bind_addr.unwrap().to_string(), "127.0.0.1:8080");

        let settings = config.time_settings().unwrap();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.propagation_delay, Duration::from_millis(100));
        assert_eq!(settings.tz.std_name(), "CET");

        let chart = config.stream_for(&config.jobs["chart"]);
        assert_eq!(chart.base, PathBuf::from("/sdcard/chartData"));
        assert!(!chart.include_seconds);
    }
}
