//! Shard event flow between a batch source and a shard processor

use std::fmt;
use std::sync::Arc;

use crate::{Checkpointer, SequencedRecord};

/// Why a shard processor is being told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Operator asked the whole worker to wind down
    Requested,

    /// The shard lease moved to another worker
    LeaseLost,

    /// The shard is fully consumed and will never carry more records
    ShardEnded,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::LeaseLost => "lease_lost",
            Self::ShardEnded => "shard_ended",
        };
        write!(f, "{s}")
    }
}

/// A batch of records plus the checkpoint capability for this shard.
#[derive(Clone)]
pub struct RecordBatch {
    /// Records in sequence order
    pub records: Vec<SequencedRecord>,

    /// How far the newest record in this batch lags the shard tip
    pub millis_behind_latest: u64,

    /// Capability to persist progress through this batch
    pub checkpointer: Arc<dyn Checkpointer>,
}

impl fmt::Debug for RecordBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordBatch")
            .field("records", &self.records.len())
            .field("millis_behind_latest", &self.millis_behind_latest)
            .finish_non_exhaustive()
    }
}

/// Shutdown notice delivered to one shard processor.
///
/// Lease loss carries no checkpointer on purpose: checkpointing a lost
/// lease is illegal, so the capability is withheld at the type level.
#[derive(Clone)]
pub struct ShutdownSignal {
    reason: ShutdownReason,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl ShutdownSignal {
    /// Operator-requested wind-down; a final tolerant checkpoint is allowed.
    pub fn requested(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            reason: ShutdownReason::Requested,
            checkpointer: Some(checkpointer),
        }
    }

    /// Lease stolen; no checkpoint capability.
    pub fn lease_lost() -> Self {
        Self {
            reason: ShutdownReason::LeaseLost,
            checkpointer: None,
        }
    }

    /// Shard consumed to its end; the final checkpoint is mandatory.
    pub fn shard_ended(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            reason: ShutdownReason::ShardEnded,
            checkpointer: Some(checkpointer),
        }
    }

    /// Which shutdown this is
    pub fn reason(&self) -> ShutdownReason {
        self.reason
    }

    /// Checkpoint capability, absent for lease loss
    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer>> {
        self.checkpointer.as_ref()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("reason", &self.reason)
            .field("has_checkpointer", &self.checkpointer.is_some())
            .finish()
    }
}

/// Everything a shard processor can receive from its source.
#[derive(Debug, Clone)]
pub enum ShardEvent {
    /// A batch of records to process
    Records(RecordBatch),

    /// Terminal notice; no further events follow on this shard
    Shutdown(ShutdownSignal),
}
