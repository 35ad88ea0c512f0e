//! Load run orchestration
//!
//! Wires generator, scheduler, completion sink and progress reporter over
//! one transport, then drains and flushes at the end of the window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{ProducerConfig, RecordTransport};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    CompletionSink, EmissionScheduler, ProducerError, ProgressReporter, PutCounters,
    RecordGenerator,
};

/// End-of-run accounting for one load run.
#[derive(Debug, Clone)]
pub struct EmissionReport {
    pub stream: String,
    pub target_total: u64,
    pub attempted: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub aborted: bool,
    pub elapsed: Duration,
}

/// Runs one rate-governed emission window against a transport.
pub struct LoadRunner<T> {
    transport: Arc<T>,
    config: ProducerConfig,
    abort: CancellationToken,
}

impl<T: RecordTransport> LoadRunner<T> {
    pub fn new(transport: Arc<T>, config: ProducerConfig) -> Self {
        Self {
            transport,
            config,
            abort: CancellationToken::new(),
        }
    }

    /// Use an externally owned abort token (Ctrl-C wiring).
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Emit for the configured window, then drain completions and flush.
    ///
    /// Drain is bounded by `seconds_to_run + 1`; completions that miss the
    /// deadline are abandoned, which is logged but not fatal. Any delivery
    /// failure is fatal and surfaces here as an error.
    #[instrument(name = "load_run", skip_all, fields(stream = %self.transport.stream_name()))]
    pub async fn run(self) -> Result<EmissionReport, ProducerError> {
        let counters = PutCounters::new();
        let generator = RecordGenerator::new();
        let mut sink = CompletionSink::new(counters.clone(), self.abort.clone());

        let scheduler =
            EmissionScheduler::builder(self.config.records_per_second, self.config.seconds_to_run)
                .counters(counters.clone())
                .abort(self.abort.clone())
                .build()?;
        let target_total = scheduler.target_total();

        let reporter = ProgressReporter::spawn(counters.clone(), target_total);
        let started = Instant::now();

        let transport = self.transport.clone();
        let run_result = scheduler
            .run(|| {
                let record = generator.next_record()?;
                let handle = transport.put_record(record)?;
                sink.track(handle);
                Ok(())
            })
            .await;

        let outcome = match run_result {
            Ok(outcome) => outcome,
            Err(error) => {
                // Dropping the sink aborts its in-flight completion tasks
                drop(sink);
                reporter.stop().await;
                return Err(error);
            }
        };

        let drain_timeout = Duration::from_secs(self.config.seconds_to_run + 1);
        let drain_result = sink.drain(drain_timeout).await;
        reporter.stop().await;
        let drain = drain_result?;

        self.transport.flush().await?;

        let report = EmissionReport {
            stream: self.transport.stream_name().to_string(),
            target_total,
            attempted: outcome.attempted,
            completed: counters.completed(),
            abandoned: drain.abandoned,
            aborted: outcome.aborted,
            elapsed: started.elapsed(),
        };
        info!(
            attempted = report.attempted,
            completed = report.completed,
            abandoned = report.abandoned,
            aborted = report.aborted,
            "load run finished"
        );
        Ok(report)
    }
}
