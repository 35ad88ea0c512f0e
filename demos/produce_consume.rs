//! Produce/Consume Example
//!
//! Runs the whole benchmark loop in one process: a rate-governed producer
//! feeds the in-memory stream while one checkpointed processor per shard
//! drains it, and the run ends when every shard reaches its end.
//!
//! Run with: cargo run --bin produce_consume [config.toml]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use config_loader::ConfigLoader;
use consumer::ShardProcessor;
use contracts::{
    BenchConfig, ConfigVersion, ConsumerConfig, ProducerConfig, RecordHandler, SequencedRecord,
    StreamConfig, StreamError,
};
use observability::RunMetricsAggregator;
use producer::LoadRunner;
use tokio::sync::mpsc;
use transport::{InMemoryCheckpointStore, InMemoryStream, ReaderOptions, ShardReader};

/// Handler that counts records and logs progress every so often.
struct DemoHandler {
    handled: Arc<AtomicU64>,
    metrics: Arc<Mutex<RunMetricsAggregator>>,
}

impl RecordHandler for DemoHandler {
    async fn handle(&mut self, record: &SequencedRecord) -> Result<(), StreamError> {
        let total = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
        if total % 100 == 0 {
            tracing::info!(
                total,
                shard_id = %record.shard_id,
                sequence = record.sequence_number,
                "progress"
            );
        }
        self.metrics.lock().unwrap().update_record(record);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Produce/Consume Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading benchmark config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_demo_config()
    };
    tracing::info!(
        stream = %config.stream.name,
        shards = config.stream.shard_count,
        target = config.producer.target_total(),
        "Configuration ready"
    );

    // ==== Stage 2: Create the stream and checkpoint store ====
    let stream = InMemoryStream::builder(config.stream.name.as_str(), config.stream.shard_count)
        .delivery_latency(Duration::from_millis(2))
        .build();
    let store = InMemoryCheckpointStore::new(config.consumer.application_name.clone());

    // ==== Stage 3: Start one reader + processor per shard ====
    let options = ReaderOptions {
        initial_position: config.consumer.parsed_initial_position()?,
        max_batch_size: config.consumer.max_batch_size,
        poll_interval: Duration::from_millis(config.consumer.poll_interval_ms),
        enhanced_fanout: config.stream.enhanced_fanout,
    };
    let handled = Arc::new(AtomicU64::new(0));
    let metrics = Arc::new(Mutex::new(RunMetricsAggregator::new()));

    let mut readers = Vec::new();
    let mut processors = Vec::new();
    for shard_index in 0..stream.shard_count() {
        let (tx, rx) = mpsc::channel(128);
        let handle = ShardReader::spawn(stream.clone(), store.clone(), shard_index, options.clone(), tx);
        let processor = ShardProcessor::new(
            handle.shard_id().clone(),
            DemoHandler {
                handled: handled.clone(),
                metrics: metrics.clone(),
            },
        );
        processors.push(tokio::spawn(processor.run(rx)));
        readers.push(handle);
    }
    tracing::info!(shards = readers.len(), "Consumer fleet running");

    // ==== Stage 4: Run the emission window ====
    let report = LoadRunner::new(stream.clone(), config.producer.clone())
        .run()
        .await?;
    tracing::info!(
        attempted = report.attempted,
        completed = report.completed,
        abandoned = report.abandoned,
        "Emission window finished"
    );

    // ==== Stage 5: Seal and drain every shard to its end ====
    stream.seal();
    for processor in processors {
        let shard_report = processor.await?;
        tracing::info!(
            shard_id = %shard_report.shard_id,
            processed = shard_report.records_processed,
            checkpoints = shard_report.checkpoints_committed,
            reason = ?shard_report.shutdown_reason,
            "Shard drained"
        );
    }
    for reader in readers {
        reader.join().await;
    }

    // ==== Stage 6: Print the run summary ====
    println!("{}", metrics.lock().unwrap().summary());
    for shard_id in stream.shard_ids() {
        println!(
            "{}: committed position {:?} ({} writes)",
            shard_id,
            store.last_checkpoint(&shard_id),
            store.write_count(&shard_id)
        );
    }

    tracing::info!(handled = handled.load(Ordering::SeqCst), "Demo complete");
    Ok(())
}

/// A small self-contained run for when no config file is given.
fn create_demo_config() -> BenchConfig {
    BenchConfig {
        version: ConfigVersion::V1,
        stream: StreamConfig {
            name: "demo-stream".to_string(),
            region: "ap-northeast-1".to_string(),
            shard_count: 2,
            enhanced_fanout: false,
        },
        producer: ProducerConfig {
            records_per_second: 200,
            seconds_to_run: 3,
        },
        consumer: ConsumerConfig {
            application_name: "demo-app".to_string(),
            poll_interval_ms: 50,
            ..ConsumerConfig::default()
        },
    }
}
