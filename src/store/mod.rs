/// Date-partitioned, append-only record store
///
/// Each stream writes one JSON object per line into a file per calendar day:
///
/// ```text
/// {root}/data/2024/03/05.json
/// {root}/chartData/2024/03/05.json
/// ```
///
/// Historical lines are never rewritten; the store only creates directories
/// and appends. There is no read-back API: the files are consumed by other
/// tools (chart rendering, file transfer).
///
/// ## Usage
///
/// ```rust,ignore
/// use thermolog::store::{LogRecord, PartitionedLogStore, Readings, StreamDescriptor};
///
/// let store = PartitionedLogStore::new(journal, true);
/// let stream = StreamDescriptor::new("/sdcard/data", true);
/// let record = LogRecord::new(now, Readings::new().with("teplota_senzor_1", 21.3));
/// store.append(&stream, record).await?;
/// ```

pub mod error;
pub mod partitions;
pub mod record;
pub mod writer;

pub use error::{AppendError, Result};
pub use partitions::{StreamDescriptor, partition_path};
pub use record::{LogRecord, Readings};
pub use writer::PartitionedLogStore;
