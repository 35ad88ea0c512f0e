//! Checkpoint capability and its failure taxonomy

use thiserror::Error;

/// Checkpoint failure classes.
///
/// The class alone decides the retry policy: a lost lease is final, a
/// throttle is retryable, an invalid store is final.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// The lease moved to another worker; a checkpoint now would clobber
    /// progress the new owner already committed
    #[error("lease no longer held: {message}")]
    LeaseGone { message: String },

    /// Transient throttling from the checkpoint store
    #[error("checkpoint throttled: {message}")]
    Throttled { message: String },

    /// The store rejected the checkpoint as invalid; retrying cannot help
    #[error("checkpoint store invalid: {message}")]
    StoreInvalid { message: String },
}

impl CheckpointError {
    /// Create lease-gone error
    pub fn lease_gone(message: impl Into<String>) -> Self {
        Self::LeaseGone {
            message: message.into(),
        }
    }

    /// Create throttled error
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
        }
    }

    /// Create store-invalid error
    pub fn store_invalid(message: impl Into<String>) -> Self {
        Self::StoreInvalid {
            message: message.into(),
        }
    }

    /// Whether a bounded-backoff retry loop may try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Per-shard checkpoint capability handed out with every batch and shutdown
/// signal.
///
/// The call is synchronous; callers insert their own backoff between
/// attempts.
pub trait Checkpointer: Send + Sync {
    /// Persist progress through the latest record delivered to this shard's
    /// processor.
    fn checkpoint(&self) -> Result<(), CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_throttled_is_retryable() {
        assert!(CheckpointError::throttled("rate exceeded").is_retryable());
        assert!(!CheckpointError::lease_gone("stolen").is_retryable());
        assert!(!CheckpointError::store_invalid("bad state").is_retryable());
    }
}
