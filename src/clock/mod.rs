//! Wall-clock time for the logging jobs
//!
//! - [`TimeSource`]: the external clock (SNTP-disciplined or host clock)
//! - [`TimeService`]: `now()` with bounded-retry resynchronization
//! - [`TzRule`]: POSIX timezone rule applied to every reading
//! - [`TimePoint`]: the calendar timestamp handed to the store

pub mod service;
pub mod sntp;
pub mod source;
pub mod time_point;
pub mod tz;

pub use service::{ClockError, TimeService, TimeSettings};
pub use sntp::{SntpClient, SntpError};
pub use source::{NetworkClock, SyncError, SystemClock, TimeSource};
pub use time_point::TimePoint;
pub use tz::{TzError, TzRule};
