//! Append-only error journal
//!
//! The journal is the last line of failure reporting: it never returns an
//! error to its caller. Timestamps come from a raw clock read (no resync), so
//! recording an entry can never recurse back into the time service.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::clock::TimeSource;

/// Timestamp placeholder when the clock cannot be read
pub const UNAVAILABLE_TIMESTAMP: &str = "N/A";

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to write error journal {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct ErrorJournal {
    path: PathBuf,
    clock: Arc<dyn TimeSource>,
    write_lock: Mutex<()>,
}

impl ErrorJournal {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `[timestamp]\t[ERROR]\t{message}` line
    pub async fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let timestamp = match self.clock.read_clock().await {
            Some(now) => now.to_string(),
            None => UNAVAILABLE_TIMESTAMP.to_string(),
        };
        let entry = format_entry(&timestamp, message);

        error!(journal = %self.path.display(), "{message}");

        if let Err(e) = self.append_line(&entry).await {
            error!(error = %e, "Error journal unavailable, entry dropped");
        }
    }

    async fn append_line(&self, entry: &str) -> Result<(), JournalError> {
        let _guard = self.write_lock.lock().await;
        let write_failed = |source| JournalError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_failed)?;

        let mut line = String::with_capacity(entry.len() + 1);
        line.push_str(entry);
        line.push('\n');
        file.write_all(line.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;

        debug!(path = %self.path.display(), "Error journaled");
        Ok(())
    }
}

pub fn format_entry(timestamp: &str, message: &str) -> String {
    format!("[{timestamp}]\t[ERROR]\t{message}")
}
