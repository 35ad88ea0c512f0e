//! Initial read position of a consumer on a stream

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::StreamError;

/// Compact timestamp format accepted with `AT_TIMESTAMP` (interpreted as UTC)
pub const AT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Where a consumer starts reading a shard it has no checkpoint for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialPosition {
    /// Oldest retained record
    TrimHorizon,

    /// Only records arriving after the consumer starts
    Latest,

    /// Records whose arrival time is at or after the given instant
    AtTimestamp(DateTime<Utc>),
}

impl InitialPosition {
    /// Parse the configuration pair (`initial_position`, `at_timestamp`).
    ///
    /// An unknown position name or an unparseable timestamp is a
    /// configuration error; the caller rejects it before any work begins.
    pub fn parse(position: &str, at_timestamp: Option<&str>) -> Result<Self, StreamError> {
        match position {
            "TRIM_HORIZON" => Ok(Self::TrimHorizon),
            "LATEST" => Ok(Self::Latest),
            "AT_TIMESTAMP" => {
                let raw = at_timestamp.ok_or_else(|| {
                    StreamError::config_validation(
                        "consumer.at_timestamp",
                        "AT_TIMESTAMP requires a timestamp (yyyyMMddHHmmss)",
                    )
                })?;
                let naive =
                    NaiveDateTime::parse_from_str(raw, AT_TIMESTAMP_FORMAT).map_err(|e| {
                        StreamError::config_validation(
                            "consumer.at_timestamp",
                            format!("cannot parse '{raw}' as yyyyMMddHHmmss: {e}"),
                        )
                    })?;
                Ok(Self::AtTimestamp(naive.and_utc()))
            }
            other => Err(StreamError::config_validation(
                "consumer.initial_position",
                format!("must be TRIM_HORIZON, LATEST or AT_TIMESTAMP: {other}"),
            )),
        }
    }
}
