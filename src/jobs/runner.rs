//! Periodic job runner - one tokio task per logging job

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use super::sampler::Sampler;
use crate::clock::TimeService;
use crate::observability::Metrics;
use crate::store::{LogRecord, PartitionedLogStore, StreamDescriptor};

/// A repeating logging job bound to one stream
#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub stream: StreamDescriptor,
    /// Delay between the end of one tick and the start of the next
    pub interval: Duration,
    pub sampler: Arc<dyn Sampler>,
}

/// What happened during a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Written(PathBuf),
    ClockUnavailable,
    AppendFailed,
}

/// Services shared by every job
#[derive(Clone)]
pub struct JobContext {
    pub clock: Arc<TimeService>,
    pub store: Arc<PartitionedLogStore>,
    pub metrics: Arc<Metrics>,
}

impl JobContext {
    /// Run one tick of `job`: timestamp, sample, append
    ///
    /// Failures were already journaled where they happened; the outcome only
    /// feeds metrics and diagnostics.
    pub async fn tick(&self, job: &JobSpec) -> TickOutcome {
        let now = match self.clock.now().await {
            Ok(now) => now,
            Err(e) => {
                warn!(job = %job.name, error = %e, "Skipping tick, no timestamp");
                self.metrics.tick_clock_unavailable();
                return TickOutcome::ClockUnavailable;
            }
        };

        let readings = job.sampler.sample().await;
        let record = LogRecord::new(now, readings);

        match self.store.append(&job.stream, record).await {
            Ok(path) => {
                self.metrics.tick_written();
                TickOutcome::Written(path)
            }
            Err(e) => {
                warn!(job = %job.name, error = %e, "Skipping tick, append failed");
                self.metrics.tick_append_failed();
                TickOutcome::AppendFailed
            }
        }
    }
}

pub struct JobRunner {
    context: JobContext,
    jobs: Vec<JobSpec>,
}

impl JobRunner {
    pub fn new(context: JobContext) -> Self {
        Self {
            context,
            jobs: Vec::new(),
        }
    }

    pub fn register(&mut self, job: JobSpec) {
        info!(
            job = %job.name,
            base = %job.stream.base.display(),
            interval_secs = job.interval.as_secs_f64(),
            "Job registered"
        );
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    /// Start every registered job on its own task
    ///
    /// Jobs observe `shutdown` only between ticks, so a tick in progress
    /// always runs to completion.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| {
                let span = info_span!("job", name = %job.name);
                let context = self.context.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(run_job(context, job, shutdown).instrument(span))
            })
            .collect()
    }
}

async fn run_job(context: JobContext, job: JobSpec, mut shutdown: watch::Receiver<bool>) {
    info!("Job started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        debug!("Tick starting");
        let outcome = context.tick(&job).await;
        debug!(?outcome, "Tick finished");

        tokio::select! {
            _ = tokio::time::sleep(job.interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("Job stopped");
}
