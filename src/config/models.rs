use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default = "default_jobs")]
    pub jobs: BTreeMap<String, JobConfig>,
    #[serde(default)]
    pub status: StatusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            time: TimeConfig::default(),
            sensors: SensorsConfig::default(),
            jobs: default_jobs(),
            status: StatusConfig::default(),
        }
    }
}

/// Storage root and journal location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Journal file, relative to `root` unless absolute
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
    /// fsync after every appended line
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

impl StorageConfig {
    pub fn error_log_path(&self) -> PathBuf {
        self.root.join(&self.error_log)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            error_log: default_error_log(),
            sync_writes: default_sync_writes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/sdcard")
}

fn default_error_log() -> PathBuf {
    PathBuf::from("error_log.txt")
}

fn default_sync_writes() -> bool {
    true
}

/// Where wall-clock time comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeSourceKind {
    /// Query SNTP servers and discipline the host clock by the measured offset
    #[default]
    Sntp,
    /// Trust the host clock
    System,
}

/// Time synchronization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeConfig {
    #[serde(default)]
    pub source: TimeSourceKind,
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    /// POSIX TZ rule, e.g. `CET-1CEST,M3.5.0,M10.5.0/3`
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay: HumanDuration,
    #[serde(default = "default_query_timeout")]
    pub query_timeout: HumanDuration,
    #[serde(default = "default_max_stratum")]
    pub max_stratum: u8,
    #[serde(default = "default_resync_interval")]
    pub resync_interval: HumanDuration,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            source: TimeSourceKind::default(),
            servers: default_servers(),
            timezone: default_timezone(),
            max_attempts: default_max_attempts(),
            propagation_delay: default_propagation_delay(),
            query_timeout: default_query_timeout(),
            max_stratum: default_max_stratum(),
            resync_interval: default_resync_interval(),
        }
    }
}

fn default_servers() -> Vec<String> {
    vec!["0.cz.pool.ntp.org".to_string(), "time.nist.gov".to_string()]
}

fn default_timezone() -> String {
    "CET-1CEST,M3.5.0,M10.5.0/3".to_string()
}

fn default_max_attempts() -> u32 {
    crate::clock::service::DEFAULT_MAX_ATTEMPTS
}

fn default_propagation_delay() -> HumanDuration {
    HumanDuration(crate::clock::service::DEFAULT_PROPAGATION_DELAY)
}

fn default_query_timeout() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_max_stratum() -> u8 {
    3
}

fn default_resync_interval() -> HumanDuration {
    HumanDuration::from_secs(24 * 60 * 60)
}

/// Sensor channel names, in output order
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorsConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
        }
    }
}

fn default_channels() -> Vec<String> {
    (1..=4).map(|n| format!("teplota_senzor_{n}")).collect()
}

/// One periodic logging job and the stream it writes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    /// Stream directory, relative to the storage root unless absolute
    pub base_dir: PathBuf,
    #[serde(default = "default_include_seconds")]
    pub include_seconds: bool,
    pub interval: HumanDuration,
}

fn default_include_seconds() -> bool {
    true
}

fn default_jobs() -> BTreeMap<String, JobConfig> {
    let mut jobs = BTreeMap::new();
    jobs.insert(
        "data".to_string(),
        JobConfig {
            base_dir: PathBuf::from("data"),
            include_seconds: true,
            interval: HumanDuration::from_secs(10),
        },
    );
    jobs.insert(
        "chart".to_string(),
        JobConfig {
            base_dir: PathBuf::from("chartData"),
            include_seconds: false,
            interval: HumanDuration::from_secs(600),
        },
    );
    jobs
}

/// Optional HTTP status endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<SocketAddr>,
}
