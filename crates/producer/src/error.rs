//! Producer error types

use contracts::{PutFailure, StreamError};
use thiserror::Error;

/// Errors surfaced by the load generator.
#[derive(Debug, Error)]
pub enum ProducerError {
    // ===== Configuration Errors =====
    /// Run window or rate rejected before any scheduling starts
    #[error("invalid run window: {message}")]
    InvalidRunWindow { message: String },

    // ===== Fatal Run Errors =====
    /// The transport rejected a put or a flush
    #[error("transport error: {0}")]
    Transport(#[from] StreamError),

    /// A dispatched record reached a terminal delivery failure
    #[error("record delivery failed: {failure}")]
    DeliveryFailed { failure: PutFailure },

    /// The synthetic payload could not be encoded
    #[error("payload encoding failed: {0}")]
    PayloadEncoding(#[from] serde_json::Error),
}

impl ProducerError {
    pub fn invalid_run_window(message: impl Into<String>) -> Self {
        Self::InvalidRunWindow {
            message: message.into(),
        }
    }

    pub fn delivery_failed(failure: PutFailure) -> Self {
        Self::DeliveryFailed { failure }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_failed_keeps_last_attempt() {
        let error = ProducerError::delivery_failed(PutFailure::single("InternalFailure", "boom"));
        assert!(error.to_string().contains("InternalFailure"));
        assert!(error.to_string().contains("boom"));
    }
}
