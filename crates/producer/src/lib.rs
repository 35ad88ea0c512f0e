//! Rate-governed stream load generator
//!
//! Emits synthetic records at a wall-clock governed rate for a bounded
//! window. One task schedules emission; completion handles resolve on their
//! own tasks; a failed delivery aborts the whole run.

mod completion;
mod counters;
mod error;
mod generator;
mod progress;
mod runner;
mod scheduler;

pub use completion::{CompletionSink, DrainStats};
pub use counters::PutCounters;
pub use error::ProducerError;
pub use generator::RecordGenerator;
pub use progress::{ProgressHandle, ProgressReporter};
pub use runner::{EmissionReport, LoadRunner};
pub use scheduler::{EmissionOutcome, EmissionScheduler, EmissionSchedulerBuilder};
