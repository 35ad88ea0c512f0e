//! Layered error definitions
//!
//! Categorized by source: config / put / shard / processing

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum StreamError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Put Errors =====
    /// Transport rejected the record at submission time
    #[error("put rejected on stream '{stream}': {message}")]
    PutRejected { stream: String, message: String },

    /// Stream no longer accepts records
    #[error("stream '{stream}' is closed")]
    StreamClosed { stream: String },

    // ===== Shard Errors =====
    /// Unknown shard identifier
    #[error("shard not found: {shard_id}")]
    ShardNotFound { shard_id: String },

    /// Application handler failed on a record
    #[error("record processing error: {message}")]
    RecordProcessing { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StreamError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create put rejection error
    pub fn put_rejected(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PutRejected {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create stream closed error
    pub fn stream_closed(stream: impl Into<String>) -> Self {
        Self::StreamClosed {
            stream: stream.into(),
        }
    }

    /// Create shard not found error
    pub fn shard_not_found(shard_id: impl Into<String>) -> Self {
        Self::ShardNotFound {
            shard_id: shard_id.into(),
        }
    }

    /// Create record processing error
    pub fn record_processing(message: impl Into<String>) -> Self {
        Self::RecordProcessing {
            message: message.into(),
        }
    }
}
