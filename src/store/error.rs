use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppendError {
    /// Journaled and tolerated; a missing leaf directory surfaces as `FileOpenFailed`.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open file for appending {path}: {source}")]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    SerializeFailed(String),

    #[error("Failed to write record to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<serde_json::Error> for AppendError {
    fn from(value: serde_json::Error) -> Self {
        AppendError::SerializeFailed(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppendError>;
