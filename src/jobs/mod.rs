//! Periodic logging jobs
//!
//! Each job ticks on its own fixed-delay cadence: take a timestamp, sample
//! the sensors, append one record to its stream. A failed tick is skipped
//! and the job carries on; jobs never affect one another.

pub mod runner;
pub mod sampler;

pub use runner::{JobContext, JobRunner, JobSpec, TickOutcome};
pub use sampler::{Sampler, SimulatedSensors};
