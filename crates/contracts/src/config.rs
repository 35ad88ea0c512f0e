//! Run configuration contracts shared across crates

use serde::{Deserialize, Serialize};

use crate::{InitialPosition, StreamError};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Stream shape and transport options
    pub stream: StreamConfig,

    /// Load-generation settings
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Consumer settings
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

/// Stream shape and transport options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stream name
    pub name: String,

    /// Region label (informational for the in-memory transport)
    #[serde(default = "default_region")]
    pub region: String,

    /// Number of shards
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Enhanced fan-out: each consumer gets dedicated delivery pacing
    /// instead of sharing the polling interval
    #[serde(default)]
    pub enhanced_fanout: bool,
}

fn default_region() -> String {
    "ap-northeast-1".to_string()
}

fn default_shard_count() -> usize {
    4
}

/// Producer (load generation) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Target emission rate, records per second
    #[serde(default = "default_records_per_second")]
    pub records_per_second: u64,

    /// Wall-clock window the emissions are spread over, seconds
    #[serde(default = "default_seconds_to_run")]
    pub seconds_to_run: u64,
}

fn default_records_per_second() -> u64 {
    100
}

fn default_seconds_to_run() -> u64 {
    10
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            records_per_second: default_records_per_second(),
            seconds_to_run: default_seconds_to_run(),
        }
    }
}

impl ProducerConfig {
    /// Total number of records one run emits
    pub fn target_total(&self) -> u64 {
        self.records_per_second.saturating_mul(self.seconds_to_run)
    }
}

/// Consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Worker application name (lease scoping label)
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// TRIM_HORIZON | LATEST | AT_TIMESTAMP
    #[serde(default = "default_initial_position")]
    pub initial_position: String,

    /// Companion timestamp for AT_TIMESTAMP, yyyyMMddHHmmss (UTC)
    #[serde(default)]
    pub at_timestamp: Option<String>,

    /// Bound on the graceful-shutdown wait, seconds
    #[serde(default = "default_graceful_timeout_secs")]
    pub graceful_timeout_secs: u64,

    /// Maximum records handed to a processor per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Idle delay between polls when fan-out is off, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_application_name() -> String {
    "streambench-consumer".to_string()
}

fn default_initial_position() -> String {
    "TRIM_HORIZON".to_string()
}

fn default_graceful_timeout_secs() -> u64 {
    20
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            initial_position: default_initial_position(),
            at_timestamp: None,
            graceful_timeout_secs: default_graceful_timeout_secs(),
            max_batch_size: default_max_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConsumerConfig {
    /// Parse the configured initial read position
    pub fn parsed_initial_position(&self) -> Result<InitialPosition, StreamError> {
        InitialPosition::parse(&self.initial_position, self.at_timestamp.as_deref())
    }
}
