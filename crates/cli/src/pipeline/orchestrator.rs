//! Benchmark orchestrator - wires the producer, the stream and the
//! consumer fleet together for one run.
//!
//! All three run modes share one in-process stream. In full mode the
//! consumers attach before the first put so a LATEST start still
//! observes the whole run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use consumer::{ShardProcessor, ShardSupervisor};
use contracts::{BenchConfig, RecordHandler, SequencedRecord, ShardEvent, ShardId, StreamError};
use observability::RunMetricsAggregator;
use producer::LoadRunner;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transport::{
    InMemoryCheckpointStore, InMemoryStream, ReaderOptions, ShardReader, ShardReaderHandle,
};

use super::BenchStats;
use crate::cli::RunMode;

/// Upper bound on waiting for readers and taps after the processors stopped
const WIND_DOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The validated benchmark configuration
    pub bench: BenchConfig,

    /// Which side of the benchmark to run
    pub mode: RunMode,

    /// Buffer size for the per-shard event channels
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main benchmark orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

/// One running consumer side: supervised processors plus the reader and
/// stats-tap tasks feeding them.
struct ConsumerFleet {
    supervisor: ShardSupervisor,
    readers: Vec<ShardReaderHandle>,
    taps: Vec<JoinHandle<()>>,
    run_metrics: Arc<Mutex<RunMetricsAggregator>>,
}

/// The handler every shard processor runs: records observations into the
/// shared aggregator and the metrics exporter.
struct BenchHandler {
    run_metrics: Arc<Mutex<RunMetricsAggregator>>,
}

impl RecordHandler for BenchHandler {
    async fn handle(&mut self, record: &SequencedRecord) -> Result<(), StreamError> {
        observability::record_handled(record);
        self.run_metrics.lock().await.update_record(record);
        Ok(())
    }
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the benchmark to completion or until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<BenchStats> {
        // Initialize metrics exporter (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let start_time = Instant::now();
        match self.config.mode {
            RunMode::Produce => self.run_produce(shutdown, start_time).await,
            RunMode::Consume => self.run_consume(shutdown, start_time).await,
            RunMode::Full => self.run_full(shutdown, start_time).await,
        }
    }

    /// Emit the configured load against an otherwise idle stream.
    async fn run_produce(self, shutdown: CancellationToken, start_time: Instant) -> Result<BenchStats> {
        let stream = self.build_stream();
        info!(
            stream = %self.config.bench.stream.name,
            shards = stream.shard_count(),
            "Stream created (produce mode)"
        );

        // An interrupt closes the emission window directly; the runner
        // still drains in-flight puts and reports what it managed.
        let runner = LoadRunner::new(stream.clone(), self.config.bench.producer.clone())
            .with_abort(shutdown);
        let report = runner.run().await.context("Load run failed")?;

        let mut stats = BenchStats::default();
        stats.absorb_emission(&report);
        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    /// Consume until interrupted, then wind the shards down gracefully.
    async fn run_consume(self, shutdown: CancellationToken, start_time: Instant) -> Result<BenchStats> {
        let stream = self.build_stream();
        let ConsumerFleet {
            mut supervisor,
            readers,
            taps,
            run_metrics,
        } = self.spawn_consumers(&stream)?;
        info!("Consumers running until interrupted");

        let summary = tokio::select! {
            summary = supervisor.join_all() => summary,
            _ = shutdown.cancelled() => supervisor.begin_graceful_shutdown().await,
        };

        wind_down(readers, taps).await;

        let mut stats = BenchStats::default();
        stats.active_shards = stream.shard_count();
        stats.absorb_shutdown(&summary);
        stats.run_metrics = run_metrics.lock().await.clone();
        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    /// Emit and consume in one process, then drain the shards to their ends.
    async fn run_full(self, shutdown: CancellationToken, start_time: Instant) -> Result<BenchStats> {
        let stream = self.build_stream();
        let ConsumerFleet {
            mut supervisor,
            readers,
            taps,
            run_metrics,
        } = self.spawn_consumers(&stream)?;

        // A first interrupt closes the emission window; the sealed stream
        // then lets the shards drain to their natural ends.
        let producer_abort = CancellationToken::new();
        let runner = LoadRunner::new(stream.clone(), self.config.bench.producer.clone())
            .with_abort(producer_abort.clone());
        let mut producer_task = tokio::spawn(runner.run());

        let emission_result = tokio::select! {
            joined = &mut producer_task => joined.context("Producer task panicked")?,
            _ = shutdown.cancelled() => {
                warn!("Interrupt during emission, closing the window early");
                producer_abort.cancel();
                producer_task.await.context("Producer task panicked")?
            }
        };

        let emission = match emission_result {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Emission failed, winding the consumers down");
                let _ = supervisor.begin_graceful_shutdown().await;
                wind_down(readers, taps).await;
                return Err(e).context("Load run failed");
            }
        };

        info!(
            attempted = emission.attempted,
            completed = emission.completed,
            aborted = emission.aborted,
            "Emission window finished, sealing the stream"
        );
        stream.seal();

        let summary = tokio::select! {
            summary = supervisor.join_all() => summary,
            _ = shutdown.cancelled() => {
                warn!("Interrupt during drain, requesting consumer shutdown");
                supervisor.begin_graceful_shutdown().await
            }
        };

        wind_down(readers, taps).await;

        let mut stats = BenchStats::default();
        stats.active_shards = stream.shard_count();
        stats.absorb_emission(&emission);
        stats.absorb_shutdown(&summary);
        stats.run_metrics = run_metrics.lock().await.clone();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = format!("{:.2}", stats.duration.as_secs_f64()),
            emitted = stats.records_emitted,
            processed = stats.records_processed,
            "Benchmark run complete"
        );
        Ok(stats)
    }

    fn build_stream(&self) -> Arc<InMemoryStream> {
        let stream = &self.config.bench.stream;
        InMemoryStream::builder(stream.name.as_str(), stream.shard_count).build()
    }

    /// Start one reader, stats tap and supervised processor per shard.
    fn spawn_consumers(&self, stream: &Arc<InMemoryStream>) -> Result<ConsumerFleet> {
        let consumer_config = &self.config.bench.consumer;
        let store = InMemoryCheckpointStore::new(consumer_config.application_name.clone());
        let options = ReaderOptions {
            initial_position: consumer_config.parsed_initial_position()?,
            max_batch_size: consumer_config.max_batch_size,
            poll_interval: Duration::from_millis(consumer_config.poll_interval_ms),
            enhanced_fanout: self.config.bench.stream.enhanced_fanout,
        };

        let run_metrics = Arc::new(Mutex::new(RunMetricsAggregator::new()));
        let mut supervisor =
            ShardSupervisor::new(Duration::from_secs(consumer_config.graceful_timeout_secs));
        let mut readers = Vec::new();
        let mut taps = Vec::new();

        for shard_index in 0..stream.shard_count() {
            let (reader_tx, reader_rx) = mpsc::channel(self.config.buffer_size);
            let (processor_tx, processor_rx) = mpsc::channel(self.config.buffer_size);

            let handle = ShardReader::spawn(
                stream.clone(),
                store.clone(),
                shard_index,
                options.clone(),
                reader_tx,
            );

            let handler = BenchHandler {
                run_metrics: run_metrics.clone(),
            };
            let processor = ShardProcessor::new(handle.shard_id().clone(), handler);
            supervisor.supervise(
                handle.shard_id().clone(),
                handle.shutdown_token(),
                processor.run(processor_rx),
            );

            taps.push(spawn_stats_tap(
                handle.shard_id().clone(),
                reader_rx,
                processor_tx,
                run_metrics.clone(),
            ));
            readers.push(handle);
        }

        info!(
            shards = readers.len(),
            application = %store.application_name(),
            fanout = options.enhanced_fanout,
            "Consumer fleet started"
        );
        Ok(ConsumerFleet {
            supervisor,
            readers,
            taps,
            run_metrics,
        })
    }
}

/// Forward shard events from the reader to the processor, counting batches
/// on the way through.
fn spawn_stats_tap(
    shard_id: ShardId,
    mut from_reader: mpsc::Receiver<ShardEvent>,
    to_processor: mpsc::Sender<ShardEvent>,
    run_metrics: Arc<Mutex<RunMetricsAggregator>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = from_reader.recv().await {
            if let ShardEvent::Records(ref batch) = event {
                observability::record_batch(
                    &shard_id,
                    batch.records.len(),
                    batch.millis_behind_latest,
                );
                run_metrics
                    .lock()
                    .await
                    .update_batch(batch.records.len(), batch.millis_behind_latest);
            }
            // Processor gone means the shard already shut down
            if to_processor.send(event).await.is_err() {
                break;
            }
        }
    })
}

/// Readers and taps stop on their own once the processors are gone; the
/// wait is bounded all the same.
async fn wind_down(readers: Vec<ShardReaderHandle>, taps: Vec<JoinHandle<()>>) {
    let drain = async move {
        for reader in readers {
            reader.join().await;
        }
        for tap in taps {
            let _ = tap.await;
        }
    };
    if tokio::time::timeout(WIND_DOWN_TIMEOUT, drain)
        .await
        .is_err()
    {
        warn!("Readers still running after the wind-down deadline");
    }
}
