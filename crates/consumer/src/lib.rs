//! Checkpointed sharded stream consumer
//!
//! One processor task per shard: bounded per-record retry with fixed
//! backoff, interval checkpoints, and a three-way shutdown where each
//! reason has its own checkpoint legality.

mod checkpoint;
mod processor;
mod supervisor;

pub use checkpoint::{checkpoint_with_retries, CheckpointOutcome};
pub use processor::{ShardProcessor, ShardReport};
pub use supervisor::{ShardSupervisor, ShutdownSummary};

use std::time::Duration;

/// Fixed backoff between retry attempts, for records and checkpoints alike
pub const RETRY_BACKOFF: Duration = Duration::from_millis(3000);

/// Attempt budget for one record or one checkpoint
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Interval between per-shard progress checkpoints
pub const CHECKPOINT_INTERVAL: Duration = Duration::from_millis(60_000);
