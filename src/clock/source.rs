use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::sntp::{SntpClient, SntpError};
use super::time_point::TimePoint;
use super::tz::TzRule;

/// Readings before this year mean the clock was never set
pub const MIN_VALID_YEAR: i32 = 2016;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("SNTP query failed: {0}")]
    Sntp(#[from] SntpError),

    #[error("time source rejected synchronization: {0}")]
    Rejected(String),
}

/// External wall-clock collaborator
///
/// `sync_offset` disciplines the clock against `server` and installs the
/// timezone rule; `read_clock` is a cheap local read that yields `None`
/// until the clock holds a plausible time.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn sync_offset(&self, server: &str, tz: &TzRule) -> Result<(), SyncError>;

    async fn read_clock(&self) -> Option<TimePoint>;
}

#[derive(Debug, Clone)]
struct Discipline {
    offset: TimeDelta,
    tz: TzRule,
}

/// Host clock corrected by an SNTP-measured offset
pub struct NetworkClock {
    client: SntpClient,
    state: RwLock<Option<Discipline>>,
}

impl NetworkClock {
    pub fn new(client: SntpClient) -> Self {
        Self {
            client,
            state: RwLock::new(None),
        }
    }

    pub async fn is_synced(&self) -> bool {
        self.state.read().await.is_some()
    }
}

#[async_trait]
impl TimeSource for NetworkClock {
    async fn sync_offset(&self, server: &str, tz: &TzRule) -> Result<(), SyncError> {
        let server_time = self.client.query(server).await?;
        let offset = server_time - Utc::now();

        info!(
            server,
            offset_ms = offset.num_milliseconds(),
            timezone = %tz,
            "Clock disciplined against time server"
        );

        *self.state.write().await = Some(Discipline {
            offset,
            tz: tz.clone(),
        });
        Ok(())
    }

    async fn read_clock(&self) -> Option<TimePoint> {
        let state = self.state.read().await;
        let discipline = state.as_ref()?;
        local_time_point(Utc::now() + discipline.offset, &discipline.tz)
    }
}

/// Trusts the host clock as already synchronized; only applies the timezone
pub struct SystemClock {
    tz: RwLock<TzRule>,
}

impl SystemClock {
    pub fn new(tz: TzRule) -> Self {
        Self { tz: RwLock::new(tz) }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(TzRule::utc())
    }
}

#[async_trait]
impl TimeSource for SystemClock {
    async fn sync_offset(&self, server: &str, tz: &TzRule) -> Result<(), SyncError> {
        debug!(server, timezone = %tz, "System clock: applying timezone only");
        *self.tz.write().await = tz.clone();
        Ok(())
    }

    async fn read_clock(&self) -> Option<TimePoint> {
        let tz = self.tz.read().await;
        local_time_point(Utc::now(), &tz)
    }
}

fn local_time_point(utc: DateTime<Utc>, tz: &TzRule) -> Option<TimePoint> {
    let local = tz.to_local(utc);
    if local.year() < MIN_VALID_YEAR {
        return None;
    }
    TimePoint::from_naive(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_time_point_applies_rule() {
        let tz: TzRule = "CET-1CEST,M3.5.0,M10.5.0/3".parse().unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 3, 5, 13, 30, 7).unwrap();
        assert_eq!(
            local_time_point(utc, &tz),
            TimePoint::new(2024, 3, 5, 14, 30, 7)
        );
    }

    #[test]
    fn test_unset_clock_is_rejected() {
        let utc = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 5).unwrap();
        assert_eq!(local_time_point(utc, &TzRule::utc()), None);
    }

    #[tokio::test]
    async fn test_network_clock_unsynced_reads_nothing() {
        let clock = NetworkClock::new(SntpClient::default());
        assert!(!clock.is_synced().await);
        assert!(clock.read_clock().await.is_none());
    }

    #[tokio::test]
    async fn test_system_clock_reads_host_time() {
        let clock = SystemClock::default();
        clock
            .sync_offset("unused", &"UTC0".parse().unwrap())
            .await
            .unwrap();
        let now = clock.read_clock().await.unwrap();
        assert!(i32::from(now.year()) >= MIN_VALID_YEAR);
    }
}
