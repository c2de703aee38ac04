//! Tracing setup and tick/resync counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global fmt subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    ticks_written: AtomicU64,
    ticks_clock_unavailable: AtomicU64,
    ticks_append_failed: AtomicU64,
    resyncs_ok: AtomicU64,
    resyncs_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_written(&self) {
        self.ticks_written.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_written", "Metric incremented");
    }

    pub fn tick_clock_unavailable(&self) {
        self.ticks_clock_unavailable.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_clock_unavailable", "Metric incremented");
    }

    pub fn tick_append_failed(&self) {
        self.ticks_append_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ticks_append_failed", "Metric incremented");
    }

    pub fn resync_ok(&self) {
        self.resyncs_ok.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "resyncs_ok", "Metric incremented");
    }

    pub fn resync_failed(&self) {
        self.resyncs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "resyncs_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_written: self.ticks_written.load(Ordering::Relaxed),
            ticks_clock_unavailable: self.ticks_clock_unavailable.load(Ordering::Relaxed),
            ticks_append_failed: self.ticks_append_failed.load(Ordering::Relaxed),
            resyncs_ok: self.resyncs_ok.load(Ordering::Relaxed),
            resyncs_failed: self.resyncs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_written: u64,
    pub ticks_clock_unavailable: u64,
    pub ticks_append_failed: u64,
    pub resyncs_ok: u64,
    pub resyncs_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = Metrics::new();
        metrics.tick_written();
        metrics.tick_written();
        metrics.tick_append_failed();
        metrics.resync_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks_written, 2);
        assert_eq!(snapshot.ticks_append_failed, 1);
        assert_eq!(snapshot.ticks_clock_unavailable, 0);
        assert_eq!(snapshot.resyncs_failed, 1);
    }
}
