use super::models::{Config, TimeSourceKind};
use crate::clock::{TzError, TzRule};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No jobs configured (at least one job is required)")]
    NoJobsConfigured,

    #[error("Interval must be positive: {field}")]
    ZeroInterval { field: String },

    #[error("Jobs '{first}' and '{second}' write to the same directory {dir}")]
    DuplicateBaseDir {
        first: String,
        second: String,
        dir: PathBuf,
    },

    #[error("No sensor channels configured")]
    NoChannels,

    #[error("time.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("Invalid timezone '{timezone}': {source}")]
    InvalidTimezone {
        timezone: String,
        #[source]
        source: TzError,
    },

    #[error("Time source is sntp but no servers are configured")]
    NoServers,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_jobs(config)?;
    validate_sensors(config)?;
    validate_time(config)?;
    Ok(())
}

/// Every job needs a positive interval and its own stream directory
fn validate_jobs(config: &Config) -> Result<(), ValidationError> {
    if config.jobs.is_empty() {
        return Err(ValidationError::NoJobsConfigured);
    }

    let mut seen: HashMap<PathBuf, &str> = HashMap::new();
    for (name, job) in &config.jobs {
        if job.interval.is_zero() {
            return Err(ValidationError::ZeroInterval {
                field: format!("jobs.{name}.interval"),
            });
        }

        let dir = config.storage.root.join(&job.base_dir);
        if let Some(first) = seen.insert(dir.clone(), name) {
            return Err(ValidationError::DuplicateBaseDir {
                first: first.to_string(),
                second: name.clone(),
                dir,
            });
        }
    }

    Ok(())
}

fn validate_sensors(config: &Config) -> Result<(), ValidationError> {
    if config.sensors.channels.is_empty() {
        return Err(ValidationError::NoChannels);
    }
    Ok(())
}

fn validate_time(config: &Config) -> Result<(), ValidationError> {
    let time = &config.time;

    if time.max_attempts == 0 {
        return Err(ValidationError::ZeroAttempts);
    }

    if time.resync_interval.is_zero() {
        return Err(ValidationError::ZeroInterval {
            field: "time.resync_interval".to_string(),
        });
    }

    if let Err(source) = time.timezone.parse::<TzRule>() {
        return Err(ValidationError::InvalidTimezone {
            timezone: time.timezone.clone(),
            source,
        });
    }

    if time.source == TimeSourceKind::Sntp && time.servers.is_empty() {
        return Err(ValidationError::NoServers);
    }

    Ok(())
}
