//! Record handler seam (consumer side)

use crate::{SequencedRecord, StreamError};

/// Application hook invoked once per consumed record.
///
/// Errors are retried by the shard processor with bounded backoff; a record
/// that keeps failing is skipped and logged, it never aborts the batch.
#[trait_variant::make(RecordHandler: Send)]
pub trait LocalRecordHandler {
    /// Process one record.
    async fn handle(&mut self, record: &SequencedRecord) -> Result<(), StreamError>;
}
