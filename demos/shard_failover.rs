//! Shard Failover Example
//!
//! Steals a shard lease from a running worker mid-window and hands the
//! shard to a second worker. The first worker stops without checkpointing
//! (its lease is gone), so the second worker re-reads the shard from the
//! horizon: records are re-delivered rather than lost.
//!
//! Run with: cargo run --bin shard_failover

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use consumer::ShardProcessor;
use contracts::{ProducerConfig, RecordHandler, SequencedRecord, StreamError};
use producer::LoadRunner;
use tokio::sync::mpsc;
use transport::{InMemoryCheckpointStore, InMemoryStream, ReaderOptions, ShardReader};

struct CountingHandler {
    name: &'static str,
    handled: Arc<AtomicU64>,
}

impl RecordHandler for CountingHandler {
    async fn handle(&mut self, record: &SequencedRecord) -> Result<(), StreamError> {
        let total = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
        if total % 50 == 0 {
            tracing::info!(
                worker = self.name,
                total,
                sequence = record.sequence_number,
                "progress"
            );
        }
        Ok(())
    }
}

fn reader_options() -> ReaderOptions {
    ReaderOptions {
        poll_interval: Duration::from_millis(50),
        ..ReaderOptions::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Shard Failover Demo");

    // ==== Stage 1: One-shard stream, emission running in the background ====
    let stream = InMemoryStream::builder("failover-stream", 1).build();
    let producer_config = ProducerConfig {
        records_per_second: 100,
        seconds_to_run: 2,
    };
    let runner = LoadRunner::new(stream.clone(), producer_config.clone());
    let emission = tokio::spawn(runner.run());

    // ==== Stage 2: Worker A takes the shard ====
    let store_a = InMemoryCheckpointStore::new("failover-app");
    let handled_a = Arc::new(AtomicU64::new(0));
    let (tx_a, rx_a) = mpsc::channel(128);
    let reader_a = ShardReader::spawn(stream.clone(), store_a.clone(), 0, reader_options(), tx_a);
    let processor_a = ShardProcessor::new(
        reader_a.shard_id().clone(),
        CountingHandler {
            name: "worker-a",
            handled: handled_a.clone(),
        },
    );
    let task_a = tokio::spawn(processor_a.run(rx_a));
    tracing::info!("Worker A consuming");

    // ==== Stage 3: Steal the lease mid-window ====
    tokio::time::sleep(Duration::from_millis(1000)).await;
    tracing::warn!("Stealing the shard lease from worker A");
    reader_a.steal_lease();

    let report_a = task_a.await?;
    reader_a.join().await;
    tracing::info!(
        processed = report_a.records_processed,
        checkpoints = report_a.checkpoints_committed,
        reason = ?report_a.shutdown_reason,
        "Worker A stopped"
    );

    // ==== Stage 4: Worker B re-reads from the horizon ====
    // Nothing was committed, so the new lease holder starts over.
    let store_b = InMemoryCheckpointStore::new("failover-app");
    let handled_b = Arc::new(AtomicU64::new(0));
    let (tx_b, rx_b) = mpsc::channel(128);
    let reader_b = ShardReader::spawn(stream.clone(), store_b.clone(), 0, reader_options(), tx_b);
    let processor_b = ShardProcessor::new(
        reader_b.shard_id().clone(),
        CountingHandler {
            name: "worker-b",
            handled: handled_b.clone(),
        },
    );
    let task_b = tokio::spawn(processor_b.run(rx_b));
    tracing::info!("Worker B consuming");

    // ==== Stage 5: Finish the window and drain worker B to the end ====
    let report = emission.await??;
    tracing::info!(completed = report.completed, "Emission window finished");
    stream.seal();

    let report_b = task_b.await?;
    reader_b.join().await;
    tracing::info!(
        processed = report_b.records_processed,
        checkpoints = report_b.checkpoints_committed,
        reason = ?report_b.shutdown_reason,
        "Worker B drained the shard"
    );

    // ==== Stage 6: Show what the failover cost ====
    let shard_id = &stream.shard_ids()[0];
    println!("\nworker A processed : {}", report_a.records_processed);
    println!("worker B processed : {}", report_b.records_processed);
    println!(
        "re-delivered       : {}",
        report_a.records_processed + report_b.records_processed - report.completed
    );
    println!(
        "B committed        : {:?} ({} writes)",
        store_b.last_checkpoint(shard_id),
        store_b.write_count(shard_id)
    );
    println!("A committed        : {:?}", store_a.last_checkpoint(shard_id));

    Ok(())
}
