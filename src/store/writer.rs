use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::{AppendError, Result};
use super::partitions::{StreamDescriptor, directory_chain, partition_path};
use super::record::LogRecord;
use crate::journal::ErrorJournal;

/// Append-only, date-partitioned record store on local storage
///
/// Each `append` resolves the partition path, creates missing directories,
/// and appends exactly one line. The whole sequence runs under a store-wide
/// lock so two writers can never race on directory creation or interleave
/// partial lines.
pub struct PartitionedLogStore {
    journal: Arc<ErrorJournal>,
    sync_writes: bool,
    write_lock: Mutex<()>,
}

impl PartitionedLogStore {
    pub fn new(journal: Arc<ErrorJournal>, sync_writes: bool) -> Self {
        Self {
            journal,
            sync_writes,
            write_lock: Mutex::new(()),
        }
    }

    /// Append `record` to its partition, returning the file written
    ///
    /// Failures are journaled before being returned. Directory creation
    /// failures are journaled but not returned; the subsequent open reports
    /// them if the leaf directory is really missing.
    pub async fn append(&self, stream: &StreamDescriptor, record: LogRecord) -> Result<PathBuf> {
        let path = partition_path(&stream.base, &record.timestamp);
        let _guard = self.write_lock.lock().await;

        for (depth, dir) in directory_chain(&stream.base, &record.timestamp)
            .iter()
            .enumerate()
        {
            // The base may sit several levels below the storage root.
            if let Err(e) = ensure_dir(dir, depth == 0).await {
                self.journal.record(e.to_string()).await;
            }
        }

        let mut line = match record.to_line(stream.include_seconds) {
            Ok(line) => line,
            Err(e) => return Err(self.journaled(e).await),
        };
        line.push('\n');

        let mut file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(source) => {
                let e = AppendError::FileOpenFailed {
                    path: path.clone(),
                    source,
                };
                return Err(self.journaled(e).await);
            }
        };

        if let Err(source) = self.write_line(&mut file, &line).await {
            let e = AppendError::WriteFailed {
                path: path.clone(),
                source,
            };
            return Err(self.journaled(e).await);
        }

        debug!(path = %path.display(), bytes = line.len(), "Record appended");
        Ok(path)
    }

    async fn write_line(&self, file: &mut fs::File, line: &str) -> std::io::Result<()> {
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        if self.sync_writes {
            file.sync_data().await?;
        }
        Ok(())
    }

    async fn journaled(&self, e: AppendError) -> AppendError {
        self.journal.record(e.to_string()).await;
        e
    }
}

/// Create `dir` if it is absent; an existing directory is never an error
async fn ensure_dir(dir: &Path, with_parents: bool) -> Result<()> {
    if fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    info!(path = %dir.display(), "Creating directory");
    let created = if with_parents {
        fs::create_dir_all(dir).await
    } else {
        fs::create_dir(dir).await
    };

    match created {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(AppendError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{SystemClock, TimePoint};
    use crate::store::Readings;
    use tempfile::TempDir;

    fn create_test_store() -> (PartitionedLogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let journal = Arc::new(ErrorJournal::new(
            temp_dir.path().join("error_log.txt"),
            Arc::new(SystemClock::default()),
        ));
        (PartitionedLogStore::new(journal, true), temp_dir)
    }

    fn readings() -> Readings {
        Readings::new()
            .with("teplota_senzor_1", 21.3)
            .with("teplota_senzor_2", 20.9)
            .with("teplota_senzor_3", 22.0)
            .with("teplota_senzor_4", 21.5)
    }

    fn record_at(h: u8, m: u8, s: u8) -> LogRecord {
        LogRecord::new(TimePoint::new(2024, 3, 5, h, m, s).unwrap(), readings())
    }

    fn journal_text(temp: &TempDir) -> String {
        std::fs::read_to_string(temp.path().join("error_log.txt")).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_fine_grained_scenario() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("data"), true);

        let path = store.append(&stream, record_at(14, 30, 7)).await.unwrap();

        assert_eq!(path, temp.path().join("data/2024/03/05.json"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"datum\":\"2024-03-05\",\"cas\":\"14:30:07\",\"mereni\":[{\"teplota_senzor_1\":21.3,\"teplota_senzor_2\":20.9,\"teplota_senzor_3\":22.0,\"teplota_senzor_4\":21.5}]}\n"
        );
        assert!(journal_text(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_chart_scenario_omits_seconds() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("chartData"), false);

        let path = store.append(&stream, record_at(14, 30, 7)).await.unwrap();

        assert_eq!(path, temp.path().join("chartData/2024/03/05.json"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\"datum\":\"2024-03-05\",\"cas\":\"14:30\",\"mereni\""));
    }

    #[tokio::test]
    async fn test_appends_preserve_order_and_count() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("data"), true);

        for second in 0..10 {
            store.append(&stream, record_at(8, 0, second)).await.unwrap();
        }

        let content = std::fs::read_to_string(temp.path().join("data/2024/03/05.json")).unwrap();
        let times: Vec<String> = content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["cas"].as_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(times.len(), 10);
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[tokio::test]
    async fn test_same_minute_is_not_deduplicated() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("chartData"), false);

        store.append(&stream, record_at(14, 30, 1)).await.unwrap();
        store.append(&stream, record_at(14, 30, 2)).await.unwrap();

        let content =
            std::fs::read_to_string(temp.path().join("chartData/2024/03/05.json")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_existing_content_is_never_truncated() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("data"), true);
        let dir = temp.path().join("data/2024/03");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("05.json"), "historical\n").unwrap();

        store.append(&stream, record_at(1, 2, 3)).await.unwrap();

        let content = std::fs::read_to_string(dir.join("05.json")).unwrap();
        assert!(content.starts_with("historical\n"));
        assert_eq!(content.lines().count(), 2);
        assert!(journal_text(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_unusable_base_fails_open_and_journals() {
        let (store, temp) = create_test_store();
        // A regular file where the base directory should be
        let blocker = temp.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();
        let stream = StreamDescriptor::new(&blocker, true);

        let result = store.append(&stream, record_at(14, 30, 7)).await;

        assert!(matches!(result, Err(AppendError::FileOpenFailed { .. })));
        let journal = journal_text(&temp);
        assert!(journal.contains("Failed to create directory"));
        assert!(journal.contains("Failed to open file for appending"));
    }

    #[tokio::test]
    async fn test_serialize_failure_touches_no_file() {
        let (store, temp) = create_test_store();
        let stream = StreamDescriptor::new(temp.path().join("data"), true);
        let record = LogRecord::new(
            TimePoint::new(2024, 3, 5, 14, 30, 7).unwrap(),
            Readings::new().with("teplota_senzor_1", f64::INFINITY),
        );

        let result = store.append(&stream, record).await;

        assert!(matches!(result, Err(AppendError::SerializeFailed(_))));
        assert!(!temp.path().join("data/2024/03/05.json").exists());
        assert!(journal_text(&temp).contains("Failed to serialize record"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_to_one_partition() {
        let (store, temp) = create_test_store();
        let store = Arc::new(store);
        let stream = StreamDescriptor::new(temp.path().join("data"), true);

        let mut handles = Vec::new();
        for i in 0..20u8 {
            let store = store.clone();
            let stream = stream.clone();
            handles.push(tokio::spawn(async move {
                store.append(&stream, record_at(10, 0, i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(temp.path().join("data/2024/03/05.json")).unwrap();
        assert_eq!(content.lines().count(), 20);
        for line in content.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }
}
