//! Path layout for date-partitioned streams
//!
//! Partition structure:
//! - `{base}/{YYYY}/{MM}/{DD}.json` -> one JSON record per line
//!
//! Every path is a pure function of the stream base and the calendar day.

use std::path::{Path, PathBuf};

use crate::clock::TimePoint;

/// One logical log destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub base: PathBuf,
    pub include_seconds: bool,
}

impl StreamDescriptor {
    pub fn new(base: impl Into<PathBuf>, include_seconds: bool) -> Self {
        Self {
            base: base.into(),
            include_seconds,
        }
    }
}

/// Encode the partition file path: {base}/{YYYY}/{MM}/{DD}.json
pub fn partition_path(base: &Path, at: &TimePoint) -> PathBuf {
    base.join(format!("{:04}", at.year()))
        .join(format!("{:02}", at.month()))
        .join(format!("{:02}.json", at.day()))
}

/// Directories that must exist before the partition file can be opened,
/// outermost first: base, base/YYYY, base/YYYY/MM
pub fn directory_chain(base: &Path, at: &TimePoint) -> [PathBuf; 3] {
    let year = base.join(format!("{:04}", at.year()));
    let month = year.join(format!("{:02}", at.month()));
    [base.to_path_buf(), year, month]
}
