//! Per-shard record processing state machine
//!
//! `Initializing → Active → {requested | lease lost | shard ended} →
//! Terminated`. A processor exclusively owns its shard's cursor and stats;
//! shards never share mutable state.

use contracts::{
    RecordBatch, RecordHandler, SequencedRecord, ShardEvent, ShardId, ShutdownReason,
    ShutdownSignal,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::{checkpoint_with_retries, CHECKPOINT_INTERVAL, MAX_RETRY_ATTEMPTS, RETRY_BACKOFF};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessorState {
    Initializing,
    Active,
    Terminated,
}

/// Checkpoint schedule for one shard.
struct ShardCursor {
    last_attempt_at: Instant,
    next_deadline: Instant,
}

impl ShardCursor {
    fn new(now: Instant) -> Self {
        Self {
            last_attempt_at: now,
            next_deadline: now + CHECKPOINT_INTERVAL,
        }
    }

    fn checkpoint_due(&self, now: Instant) -> bool {
        now >= self.next_deadline
    }

    fn reset(&mut self, now: Instant) {
        self.last_attempt_at = now;
        self.next_deadline = now + CHECKPOINT_INTERVAL;
    }
}

#[derive(Debug, Default)]
struct ShardStats {
    seen: u64,
    processed: u64,
    skipped: u64,
    failed_attempts: u64,
    checkpoints_committed: u64,
}

/// What one shard processor did over its lifetime.
#[derive(Debug, Clone)]
pub struct ShardReport {
    pub shard_id: ShardId,
    pub records_seen: u64,
    pub records_processed: u64,
    pub records_skipped: u64,
    /// Handler attempts that failed and were retried or gave up
    pub failed_attempts: u64,
    pub checkpoints_committed: u64,
    /// `None` when the event channel closed without a terminal signal
    pub shutdown_reason: Option<ShutdownReason>,
}

/// Single-owner processor for one shard.
pub struct ShardProcessor<H> {
    shard_id: ShardId,
    handler: H,
    state: ProcessorState,
    stats: ShardStats,
    shutdown_reason: Option<ShutdownReason>,
}

impl<H: RecordHandler> ShardProcessor<H> {
    pub fn new(shard_id: ShardId, handler: H) -> Self {
        Self {
            shard_id,
            handler,
            state: ProcessorState::Initializing,
            stats: ShardStats::default(),
            shutdown_reason: None,
        }
    }

    /// Consume shard events until a terminal signal, then report.
    #[instrument(name = "shard_processor", skip_all, fields(shard_id = %self.shard_id))]
    pub async fn run(mut self, mut events: mpsc::Receiver<ShardEvent>) -> ShardReport {
        debug!(state = ?self.state, "processor starting");
        self.state = ProcessorState::Active;
        let mut cursor = ShardCursor::new(Instant::now());

        while let Some(event) = events.recv().await {
            match event {
                ShardEvent::Records(batch) => self.process_batch(batch, &mut cursor).await,
                ShardEvent::Shutdown(signal) => {
                    self.shutdown(signal).await;
                    break;
                }
            }
        }

        if self.state != ProcessorState::Terminated {
            warn!("event channel closed without a shutdown signal");
            self.state = ProcessorState::Terminated;
        }
        self.report()
    }

    async fn process_batch(&mut self, batch: RecordBatch, cursor: &mut ShardCursor) {
        if self.state != ProcessorState::Active {
            return;
        }
        debug!(
            records = batch.records.len(),
            behind_ms = batch.millis_behind_latest,
            "processing batch"
        );
        metrics::histogram!("streambench_batch_lag_millis")
            .record(batch.millis_behind_latest as f64);

        for record in &batch.records {
            self.stats.seen += 1;
            if self.process_with_retries(record).await {
                self.stats.processed += 1;
                metrics::counter!("streambench_records_total", "outcome" => "processed")
                    .increment(1);
            } else {
                self.stats.skipped += 1;
                metrics::counter!("streambench_records_total", "outcome" => "skipped").increment(1);
                error!(
                    sequence = record.sequence_number,
                    "record dropped after exhausting retries"
                );
            }
        }

        if cursor.checkpoint_due(Instant::now()) {
            let age = cursor.last_attempt_at.elapsed();
            debug!(since_last_ms = age.as_millis() as u64, "interval checkpoint due");
            let outcome = checkpoint_with_retries(batch.checkpointer.as_ref()).await;
            if outcome.is_committed() {
                self.stats.checkpoints_committed += 1;
            }
            cursor.reset(Instant::now());
        }
    }

    /// Bounded retry for one record: up to [`MAX_RETRY_ATTEMPTS`] attempts
    /// with [`RETRY_BACKOFF`] between them. Returns false when the record
    /// is given up on; the batch still advances.
    async fn process_with_retries(&mut self, record: &SequencedRecord) -> bool {
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            match self.handler.handle(record).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(
                            sequence = record.sequence_number,
                            attempt, "record processed after retries"
                        );
                    }
                    return true;
                }
                Err(error) => {
                    self.stats.failed_attempts += 1;
                    warn!(
                        sequence = record.sequence_number,
                        attempt,
                        %error,
                        "record processing failed"
                    );
                    if attempt < MAX_RETRY_ATTEMPTS {
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                }
            }
        }
        false
    }

    async fn shutdown(&mut self, signal: ShutdownSignal) {
        let reason = signal.reason();
        info!(%reason, "shard shutting down");

        match reason {
            ShutdownReason::Requested => {
                // One attempt only; a failure must not delay the wind-down
                if let Some(checkpointer) = signal.checkpointer() {
                    match checkpointer.checkpoint() {
                        Ok(()) => {
                            self.stats.checkpoints_committed += 1;
                            metrics::counter!("streambench_checkpoints_total", "outcome" => "committed").increment(1);
                        }
                        Err(error) => {
                            warn!(%error, "final checkpoint failed, shutting down anyway");
                            metrics::counter!("streambench_checkpoints_total", "outcome" => "gave_up").increment(1);
                        }
                    }
                }
            }
            ShutdownReason::LeaseLost => {
                // The lease belongs to another worker now; no capability,
                // no call
            }
            ShutdownReason::ShardEnded => {
                if let Some(checkpointer) = signal.checkpointer() {
                    let outcome = checkpoint_with_retries(checkpointer.as_ref()).await;
                    if outcome.is_committed() {
                        self.stats.checkpoints_committed += 1;
                    } else {
                        error!(?outcome, "end-of-shard checkpoint did not commit");
                    }
                }
            }
        }

        self.shutdown_reason = Some(reason);
        self.state = ProcessorState::Terminated;
        info!(
            %reason,
            processed = self.stats.processed,
            skipped = self.stats.skipped,
            "shard terminated"
        );
    }

    fn report(self) -> ShardReport {
        ShardReport {
            shard_id: self.shard_id,
            records_seen: self.stats.seen,
            records_processed: self.stats.processed,
            records_skipped: self.stats.skipped,
            failed_attempts: self.stats.failed_attempts,
            checkpoints_committed: self.stats.checkpoints_committed,
            shutdown_reason: self.shutdown_reason,
        }
    }
}
