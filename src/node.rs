//! Logger node wiring: clock, journal, store, jobs, resync and status tasks

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{
    ClockError, NetworkClock, SntpClient, SystemClock, TimePoint, TimeService, TimeSource,
    TzRule,
};
use crate::config::{Config, TimeSourceKind, ValidationError};
use crate::jobs::{JobContext, JobRunner, JobSpec, SimulatedSensors};
use crate::journal::ErrorJournal;
use crate::observability::Metrics;
use crate::server;
use crate::store::PartitionedLogStore;

/// Journaled when the startup synchronization fails
pub const INITIAL_SYNC_FAILED: &str = "Failed to set time";

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Storage root {path} is not available: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Time synchronization failed")]
    SyncFailed,

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// A fully wired logger, ready to start its jobs
pub struct Node {
    config: Config,
    context: JobContext,
    journal: Arc<ErrorJournal>,
}

impl Node {
    /// Check the storage root and build every shared service
    ///
    /// Nothing is synchronized or spawned yet.
    pub async fn build(config: Config) -> Result<Self> {
        check_storage_root(&config.storage.root).await?;

        let settings = config.time_settings()?;
        let source = time_source(&config, &settings.tz);
        let metrics = Arc::new(Metrics::new());
        let journal = Arc::new(ErrorJournal::new(
            config.storage.error_log_path(),
            source.clone(),
        ));
        let clock = Arc::new(TimeService::new(
            source,
            journal.clone(),
            metrics.clone(),
            settings,
        ));
        let store = Arc::new(PartitionedLogStore::new(
            journal.clone(),
            config.storage.sync_writes,
        ));

        Ok(Self {
            config,
            context: JobContext {
                clock,
                store,
                metrics,
            },
            journal,
        })
    }

    pub fn clock(&self) -> &Arc<TimeService> {
        &self.context.clock
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.context.metrics.clone()
    }

    /// Startup synchronization; a failure is journaled and the node carries on
    pub async fn initial_sync(&self) -> bool {
        let synced = self.context.clock.sync().await;
        if synced {
            info!("Clock synchronized");
        } else {
            self.journal.record(INITIAL_SYNC_FAILED).await;
        }
        synced
    }

    /// Run the node until `signal` resolves, then stop every task
    ///
    /// Jobs finish the tick they are in before exiting.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.initial_sync().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut runner = JobRunner::new(self.context.clone());
        let sensors = Arc::new(SimulatedSensors::new(self.config.sensors.channels.clone()));
        for (name, job) in &self.config.jobs {
            runner.register(JobSpec {
                name: name.clone(),
                stream: self.config.stream_for(job),
                interval: job.interval.as_duration(),
                sampler: sensors.clone(),
            });
        }
        let mut handles = runner.spawn(shutdown_rx.clone());

        let clock = self.context.clock.clone();
        let resync_interval = self.config.time.resync_interval.as_duration();
        let resync_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            clock.run_resync(resync_interval, resync_rx).await;
        }));

        if let Some(addr) = self.config.status.bind_addr {
            handles.push(spawn_status(addr, self.context.metrics.clone(), shutdown_rx));
        }

        info!(tasks = handles.len(), "Node running");
        signal.await;

        info!("Stopping node");
        // Receivers may already be gone if every task exited early
        let _ = shutdown_tx.send(true);
        for handle in handles {
            handle.await?;
        }

        let snapshot = self.context.metrics.snapshot();
        info!(
            ticks_written = snapshot.ticks_written,
            ticks_clock_unavailable = snapshot.ticks_clock_unavailable,
            ticks_append_failed = snapshot.ticks_append_failed,
            "Node stopped"
        );
        Ok(())
    }
}

/// Build a node and run it until Ctrl+C or SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let node = Node::build(config).await?;
    node.run_until(server::shutdown_signal()).await
}

/// Synchronize once and read the resulting local time
pub async fn sync_once(config: Config) -> Result<TimePoint> {
    let node = Node::build(config).await?;
    if !node.initial_sync().await {
        return Err(NodeError::SyncFailed);
    }
    Ok(node.clock().now().await?)
}

fn time_source(config: &Config, tz: &TzRule) -> Arc<dyn TimeSource> {
    match config.time.source {
        TimeSourceKind::Sntp => Arc::new(NetworkClock::new(SntpClient::new(
            config.time.query_timeout.as_duration(),
            config.time.max_stratum,
        ))),
        TimeSourceKind::System => Arc::new(SystemClock::new(tz.clone())),
    }
}

async fn check_storage_root(root: &std::path::Path) -> Result<()> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|source| NodeError::StorageUnavailable {
            path: root.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(NodeError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

fn spawn_status(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = server::run(addr, metrics, shutdown).await {
            warn!(%addr, error = %e, "Status server exited");
        }
    })
}
