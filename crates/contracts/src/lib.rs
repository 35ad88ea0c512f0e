//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Producer-side rate math uses one monotonic clock origin captured at run start
//! - `sequence_number` is per-shard and strictly increasing; wall-clock
//!   timestamps on records are informational only

mod checkpoint;
mod config;
mod error;
mod handler;
mod position;
mod record;
mod shard_id;
mod shard_source;
mod transport;

pub use checkpoint::{CheckpointError, Checkpointer};
pub use config::*;
pub use error::*;
pub use handler::{LocalRecordHandler, RecordHandler};
pub use position::{InitialPosition, AT_TIMESTAMP_FORMAT};
pub use record::*;
pub use shard_id::ShardId;
pub use shard_source::*;
pub use transport::*;
