//! Stream transport seam (producer side)
//!
//! `put_record` is a synchronous submission that returns a completion
//! handle; delivery resolves asynchronously and out of submission order.

use tokio::sync::oneshot;

use crate::{PutFailure, PutResult, Record, StreamError};

/// Completion handle for one submitted record.
#[derive(Debug)]
pub struct PutHandle {
    rx: oneshot::Receiver<PutResult>,
}

/// Resolver half held by the transport until the record reaches a terminal
/// outcome.
#[derive(Debug)]
pub struct PutResolver {
    tx: oneshot::Sender<PutResult>,
}

impl PutHandle {
    /// Create a connected resolver/handle pair.
    pub fn pair() -> (PutResolver, PutHandle) {
        let (tx, rx) = oneshot::channel();
        (PutResolver { tx }, PutHandle { rx })
    }

    /// Wait for the terminal outcome.
    ///
    /// A transport that drops its resolver without answering counts as a
    /// failed delivery, never as silence.
    pub async fn outcome(self) -> PutResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(PutFailure::single(
                "TransportDropped",
                "transport dropped the record without a terminal outcome",
            )),
        }
    }
}

impl PutResolver {
    /// Deliver the terminal outcome. Consumes the resolver: each record gets
    /// exactly one answer.
    pub fn resolve(self, result: PutResult) {
        // The handle side may already be gone after an abandoned drain.
        let _ = self.tx.send(result);
    }
}

/// Stream transport contract.
#[trait_variant::make(RecordTransport: Send)]
pub trait LocalRecordTransport {
    /// Name of the stream this transport writes to.
    fn stream_name(&self) -> &str;

    /// Submit one record.
    ///
    /// Returns immediately so a single emission task can sustain its target
    /// rate; the handle resolves once delivery reaches a terminal outcome.
    fn put_record(&self, record: Record) -> Result<PutHandle, StreamError>;

    /// Wait until every accepted record has reached a terminal outcome.
    async fn flush(&self) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PutAck, ShardId};

    #[tokio::test]
    async fn test_handle_resolves_ack() {
        let (resolver, handle) = PutHandle::pair();
        resolver.resolve(Ok(PutAck {
            shard_id: ShardId::from_index(0),
            sequence_number: 7,
        }));

        let ack = handle.outcome().await.unwrap();
        assert_eq!(ack.sequence_number, 7);
    }

    #[tokio::test]
    async fn test_dropped_resolver_is_a_failure() {
        let (resolver, handle) = PutHandle::pair();
        drop(resolver);

        let failure = handle.outcome().await.unwrap_err();
        assert_eq!(failure.last_attempt().unwrap().error_code, "TransportDropped");
    }
}
