//! Per-shard batch pump
//!
//! Feeds `ShardEvent`s to a processor: record batches while the shard has
//! data, then exactly one terminal signal (shard end or lease steal).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contracts::{InitialPosition, RecordBatch, ShardEvent, ShardId, ShutdownSignal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{InMemoryCheckpointStore, InMemoryStream, StoreCheckpointer};

/// Delivery pacing when enhanced fan-out is on: the reader is woken by
/// appends, this only bounds the wait between wake-ups.
const FANOUT_PACING: Duration = Duration::from_millis(10);

/// Reader tuning
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Where to start when the shard has no checkpoint
    pub initial_position: InitialPosition,
    /// Maximum records per batch
    pub max_batch_size: usize,
    /// Idle delay between polls when fan-out is off
    pub poll_interval: Duration,
    /// Enhanced fan-out: wake on append instead of polling
    pub enhanced_fanout: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            initial_position: InitialPosition::TrimHorizon,
            max_batch_size: 1000,
            poll_interval: Duration::from_millis(200),
            enhanced_fanout: false,
        }
    }
}

/// Handle to one spawned shard reader.
pub struct ShardReaderHandle {
    shard_id: ShardId,
    shutdown: CancellationToken,
    steal: CancellationToken,
    join: JoinHandle<()>,
}

impl ShardReaderHandle {
    /// Shard this reader pumps
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    /// Ask the reader to stop gracefully: it delivers a requested-shutdown
    /// signal carrying its checkpointer instead of further batches.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token form of [`request_shutdown`](Self::request_shutdown), for a
    /// supervisor that owns the trigger.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Move the lease to another worker: the reader revokes its store row
    /// and delivers a lease-lost shutdown instead of further batches.
    pub fn steal_lease(&self) {
        self.steal.cancel();
    }

    /// Wait for the reader task to finish
    pub async fn join(self) {
        let _ = self.join.await;
    }

    /// Stop the reader without any terminal signal
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Spawns per-shard readers over an [`InMemoryStream`].
pub struct ShardReader;

impl ShardReader {
    /// Spawn a reader pumping `events` for the shard at `shard_index`.
    ///
    /// The start position is resolved here, at lease acquisition: an existing
    /// checkpoint wins over the configured initial position.
    pub fn spawn(
        stream: Arc<InMemoryStream>,
        store: Arc<InMemoryCheckpointStore>,
        shard_index: usize,
        options: ReaderOptions,
        events: mpsc::Sender<ShardEvent>,
    ) -> ShardReaderHandle {
        let shutdown = CancellationToken::new();
        let steal = CancellationToken::new();
        let shard_id = stream
            .shard_ids()
            .get(shard_index)
            .cloned()
            .unwrap_or_else(|| ShardId::from_index(shard_index));

        let start_sequence = match store.last_checkpoint(&shard_id) {
            Some(position) => position,
            None => match options.initial_position {
                InitialPosition::TrimHorizon => 0,
                InitialPosition::Latest => stream.next_sequence(shard_index),
                InitialPosition::AtTimestamp(ts) => stream.sequence_at_timestamp(shard_index, ts),
            },
        };

        let task = ReaderTask {
            stream,
            store,
            shard_id: shard_id.clone(),
            shard_index,
            start_sequence,
            options,
            events,
            shutdown: shutdown.clone(),
            steal: steal.clone(),
        };
        let join = tokio::spawn(task.run());

        ShardReaderHandle {
            shard_id,
            shutdown,
            steal,
            join,
        }
    }
}

struct ReaderTask {
    stream: Arc<InMemoryStream>,
    store: Arc<InMemoryCheckpointStore>,
    shard_id: ShardId,
    shard_index: usize,
    start_sequence: u64,
    options: ReaderOptions,
    events: mpsc::Sender<ShardEvent>,
    shutdown: CancellationToken,
    steal: CancellationToken,
}

impl ReaderTask {
    #[instrument(name = "shard_reader", skip_all, fields(shard_id = %self.shard_id))]
    async fn run(self) {
        if self.shard_index >= self.stream.shard_count() {
            warn!(shard_index = self.shard_index, "no such shard, reader exiting");
            return;
        }

        let checkpointer = StoreCheckpointer::new(self.store.clone(), self.shard_id.clone());
        let mut next_sequence = self.start_sequence;
        checkpointer.advance_to(next_sequence);
        info!(
            next_sequence,
            fanout = self.options.enhanced_fanout,
            "reader started"
        );

        loop {
            // A stolen lease outranks a graceful request
            if self.steal.is_cancelled() {
                self.store.revoke_lease(&self.shard_id);
                let _ = self
                    .events
                    .send(ShardEvent::Shutdown(ShutdownSignal::lease_lost()))
                    .await;
                info!("lease stolen, reader stopped");
                return;
            }

            if self.shutdown.is_cancelled() {
                let _ = self
                    .events
                    .send(ShardEvent::Shutdown(ShutdownSignal::requested(
                        checkpointer.clone(),
                    )))
                    .await;
                info!("shutdown requested, reader stopped");
                return;
            }

            let records =
                self.stream
                    .read_from(self.shard_index, next_sequence, self.options.max_batch_size);
            if let Some(last) = records.last() {
                next_sequence = last.sequence_number + 1;
                checkpointer.advance_to(next_sequence);

                let millis_behind_latest =
                    (Utc::now() - last.arrival_time).num_milliseconds().max(0) as u64;
                let batch = RecordBatch {
                    records,
                    millis_behind_latest,
                    checkpointer: checkpointer.clone(),
                };
                if self.events.send(ShardEvent::Records(batch)).await.is_err() {
                    debug!("processor gone, reader stopping");
                    return;
                }
                // Still behind: read again without idling
                continue;
            }

            if self.stream.fully_consumed(self.shard_index, next_sequence) {
                let _ = self
                    .events
                    .send(ShardEvent::Shutdown(ShutdownSignal::shard_ended(
                        checkpointer.clone(),
                    )))
                    .await;
                info!(next_sequence, "shard consumed to its end, reader stopped");
                return;
            }

            if self.options.enhanced_fanout {
                tokio::select! {
                    _ = self.steal.cancelled() => {}
                    _ = self.shutdown.cancelled() => {}
                    _ = self.stream.wait_for_append() => {}
                    _ = tokio::time::sleep(FANOUT_PACING) => {}
                }
            } else {
                tokio::select! {
                    _ = self.steal.cancelled() => {}
                    _ = self.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.options.poll_interval) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{Checkpointer, Record, RecordTransport, ShutdownReason};

    fn options(max_batch: usize) -> ReaderOptions {
        ReaderOptions {
            max_batch_size: max_batch,
            poll_interval: Duration::from_millis(10),
            ..ReaderOptions::default()
        }
    }

    async fn fill(stream: &InMemoryStream, n: usize) {
        for i in 0..n {
            stream
                .put_record(Record::new(format!("k{i}"), Bytes::from_static(b"{}")))
                .unwrap();
        }
        stream.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_trim_horizon_reads_everything_then_ends() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 5).await;
        stream.seal();

        let store = InMemoryCheckpointStore::new("app");
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ShardReader::spawn(stream, store, 0, options(2), tx);

        let mut seen = Vec::new();
        loop {
            match rx.recv().await.expect("reader closed early") {
                ShardEvent::Records(batch) => {
                    assert!(batch.records.len() <= 2);
                    seen.extend(batch.records.iter().map(|r| r.sequence_number));
                }
                ShardEvent::Shutdown(signal) => {
                    assert_eq!(signal.reason(), ShutdownReason::ShardEnded);
                    assert!(signal.checkpointer().is_some());
                    break;
                }
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        handle.join().await;
    }

    #[tokio::test]
    async fn test_latest_skips_existing_records() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 3).await;

        let store = InMemoryCheckpointStore::new("app");
        let (tx, mut rx) = mpsc::channel(8);
        let opts = ReaderOptions {
            initial_position: InitialPosition::Latest,
            ..options(10)
        };
        let handle = ShardReader::spawn(stream.clone(), store, 0, opts, tx);

        fill(&stream, 2).await;
        stream.seal();

        let mut seen = Vec::new();
        loop {
            match rx.recv().await.expect("reader closed early") {
                ShardEvent::Records(batch) => {
                    seen.extend(batch.records.iter().map(|r| r.sequence_number))
                }
                ShardEvent::Shutdown(_) => break,
            }
        }
        assert_eq!(seen, vec![3, 4]);
        handle.join().await;
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint_over_initial_position() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 4).await;
        stream.seal();

        let store = InMemoryCheckpointStore::new("app");
        let cp = StoreCheckpointer::new(store.clone(), ShardId::from_index(0));
        cp.advance_to(2);
        cp.checkpoint().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let handle = ShardReader::spawn(stream, store, 0, options(10), tx);

        let mut seen = Vec::new();
        loop {
            match rx.recv().await.expect("reader closed early") {
                ShardEvent::Records(batch) => {
                    seen.extend(batch.records.iter().map(|r| r.sequence_number))
                }
                ShardEvent::Shutdown(_) => break,
            }
        }
        assert_eq!(seen, vec![2, 3]);
        handle.join().await;
    }

    #[tokio::test]
    async fn test_at_timestamp_splits_by_arrival() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 2).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let cut = Utc::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        fill(&stream, 2).await;
        stream.seal();

        let store = InMemoryCheckpointStore::new("app");
        let (tx, mut rx) = mpsc::channel(8);
        let opts = ReaderOptions {
            initial_position: InitialPosition::AtTimestamp(cut),
            ..options(10)
        };
        let handle = ShardReader::spawn(stream, store, 0, opts, tx);

        let mut seen = Vec::new();
        loop {
            match rx.recv().await.expect("reader closed early") {
                ShardEvent::Records(batch) => {
                    seen.extend(batch.records.iter().map(|r| r.sequence_number))
                }
                ShardEvent::Shutdown(_) => break,
            }
        }
        assert_eq!(seen, vec![2, 3]);
        handle.join().await;
    }

    #[tokio::test]
    async fn test_request_shutdown_delivers_requested_with_checkpointer() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 2).await;

        let store = InMemoryCheckpointStore::new("app");
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ShardReader::spawn(stream, store.clone(), 0, options(10), tx);

        let ShardEvent::Records(_) = rx.recv().await.unwrap() else {
            panic!("expected a batch first");
        };
        handle.request_shutdown();

        let ShardEvent::Shutdown(signal) = rx.recv().await.unwrap() else {
            panic!("expected shutdown after request");
        };
        assert_eq!(signal.reason(), ShutdownReason::Requested);

        // The carried checkpointer commits the position the reader reached
        let checkpointer = signal.checkpointer().unwrap();
        checkpointer.checkpoint().unwrap();
        assert_eq!(store.last_checkpoint(&ShardId::from_index(0)), Some(2));
        handle.join().await;
    }

    #[tokio::test]
    async fn test_steal_lease_delivers_lease_lost_and_revokes() {
        let stream = InMemoryStream::builder("t", 1).build();
        fill(&stream, 1).await;

        let store = InMemoryCheckpointStore::new("app");
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ShardReader::spawn(stream, store.clone(), 0, options(10), tx);

        // First the batch, then we steal
        let ShardEvent::Records(batch) = rx.recv().await.unwrap() else {
            panic!("expected a batch first");
        };
        handle.steal_lease();

        let ShardEvent::Shutdown(signal) = rx.recv().await.unwrap() else {
            panic!("expected shutdown after steal");
        };
        assert_eq!(signal.reason(), ShutdownReason::LeaseLost);
        assert!(signal.checkpointer().is_none());

        // The revoked lease rejects the batch's checkpointer too
        assert!(batch.checkpointer.checkpoint().is_err());
        handle.join().await;
    }
}
