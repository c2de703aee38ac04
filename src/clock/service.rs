use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::source::TimeSource;
use super::time_point::TimePoint;
use super::tz::TzRule;
use crate::journal::ErrorJournal;
use crate::observability::Metrics;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock unavailable after {attempts} resynchronization attempts")]
    ClockUnavailable { attempts: u32 },
}

/// Time service settings
#[derive(Debug, Clone)]
pub struct TimeSettings {
    pub servers: Vec<String>,
    pub tz: TzRule,
    pub max_attempts: u32,
    pub propagation_delay: Duration,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            servers: vec!["pool.ntp.org".to_string()],
            tz: TzRule::utc(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
        }
    }
}

/// Synchronized wall-clock time with bounded-retry resynchronization
///
/// `now()` reads the clock and, if that fails, resynchronizes up to
/// `max_attempts` times before giving up with [`ClockError::ClockUnavailable`].
/// Resynchronization is a critical section: concurrent callers queue on the
/// sync lock and reuse the clock the first caller repaired.
pub struct TimeService {
    source: Arc<dyn TimeSource>,
    journal: Arc<ErrorJournal>,
    metrics: Arc<Metrics>,
    settings: TimeSettings,
    sync_lock: Mutex<()>,
    last_known: Mutex<Option<TimePoint>>,
}

impl TimeService {
    pub fn new(
        source: Arc<dyn TimeSource>,
        journal: Arc<ErrorJournal>,
        metrics: Arc<Metrics>,
        settings: TimeSettings,
    ) -> Self {
        Self {
            source,
            journal,
            metrics,
            settings,
            sync_lock: Mutex::new(()),
            last_known: Mutex::new(None),
        }
    }

    /// Most recent successfully read time point
    pub async fn last_known(&self) -> Option<TimePoint> {
        *self.last_known.lock().await
    }

    /// Current local time, resynchronizing if the clock cannot be read
    pub async fn now(&self) -> Result<TimePoint, ClockError> {
        if let Some(now) = self.read().await {
            return Ok(now);
        }

        let _guard = self.sync_lock.lock().await;

        // Another caller may have repaired the clock while we waited.
        if let Some(now) = self.read().await {
            return Ok(now);
        }

        let max_attempts = self.settings.max_attempts;
        for attempt in 1..=max_attempts {
            self.journal
                .record(format!(
                    "Failed to read clock, resynchronizing (attempt {attempt}/{max_attempts})"
                ))
                .await;

            self.sync_locked().await;

            if let Some(now) = self.read().await {
                info!(attempt, "Clock recovered after resynchronization");
                return Ok(now);
            }
        }

        let err = ClockError::ClockUnavailable {
            attempts: max_attempts,
        };
        self.journal.record(err.to_string()).await;
        Err(err)
    }

    /// Resynchronize against the configured servers
    ///
    /// Returns `true` only if the clock can be read after the handshake.
    pub async fn sync(&self) -> bool {
        let _guard = self.sync_lock.lock().await;
        self.sync_locked().await
    }

    /// Resync every `interval` until shutdown is signalled
    pub async fn run_resync(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Periodic clock resync started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            if !self.sync().await {
                self.journal.record("Periodic clock resynchronization failed").await;
            }
        }
        debug!("Periodic clock resync stopped");
    }

    async fn sync_locked(&self) -> bool {
        let mut configured = false;
        for server in &self.settings.servers {
            match self.source.sync_offset(server, &self.settings.tz).await {
                Ok(()) => {
                    configured = true;
                    break;
                }
                Err(e) => warn!(server = %server, error = %e, "Time server handshake failed"),
            }
        }
        if !configured {
            debug!("No time server answered, checking clock anyway");
        }

        tokio::time::sleep(self.settings.propagation_delay).await;

        let ok = self.read().await.is_some();
        if ok {
            self.metrics.resync_ok();
        } else {
            self.metrics.resync_failed();
        }
        ok
    }

    async fn read(&self) -> Option<TimePoint> {
        let now = self.source.read_clock().await?;
        *self.last_known.lock().await = Some(now);
        Some(now)
    }
}
