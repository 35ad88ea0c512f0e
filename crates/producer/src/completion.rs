//! Put completion sink
//!
//! Resolves transport completion handles off the scheduler task. Handles
//! resolve concurrently and out of emission order; a delivery failure is
//! fatal to the whole run.

use std::sync::Arc;
use std::time::Duration;

use contracts::{PutHandle, PutResult};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};

use crate::{ProducerError, PutCounters};

/// Drain accounting returned by [`CompletionSink::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Completions that resolved before the deadline
    pub resolved: u64,
    /// Completions abandoned when the deadline passed
    pub abandoned: u64,
}

/// Collects one terminal outcome per emitted record.
///
/// Each tracked handle gets its own task in a `JoinSet`, so in-flight
/// concurrency is unbounded and a slow completion cannot stall emission.
pub struct CompletionSink {
    counters: Arc<PutCounters>,
    abort: CancellationToken,
    tasks: JoinSet<PutResult>,
}

impl CompletionSink {
    pub fn new(counters: Arc<PutCounters>, abort: CancellationToken) -> Self {
        Self {
            counters,
            abort,
            tasks: JoinSet::new(),
        }
    }

    /// Number of completions not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Follow one put to its terminal outcome.
    ///
    /// On failure the most recent delivery attempt is logged and the run
    /// token is cancelled so the scheduler stops emitting; the failure
    /// itself surfaces later through [`drain`](Self::drain).
    pub fn track(&mut self, handle: PutHandle) {
        let counters = self.counters.clone();
        let abort = self.abort.clone();
        self.tasks.spawn(async move {
            let result = handle.outcome().await;
            counters.record_completion();
            match &result {
                Ok(_) => {
                    metrics::counter!("streambench_puts_total", "outcome" => "ack").increment(1);
                }
                Err(failure) => {
                    metrics::counter!("streambench_puts_total", "outcome" => "failure")
                        .increment(1);
                    match failure.last_attempt() {
                        Some(attempt) => error!(
                            error_code = %attempt.error_code,
                            error_message = %attempt.error_message,
                            "record put failed, aborting run"
                        ),
                        None => error!("record put failed with no attempt detail, aborting run"),
                    }
                    abort.cancel();
                }
            }
            result
        });
    }

    /// Wait for every tracked completion, bounded by `timeout`.
    ///
    /// Returns the first delivery failure as an error. Completions still
    /// unresolved at the deadline are abandoned: counted and logged, never
    /// retried.
    #[instrument(name = "completion_drain", skip(self), fields(in_flight = self.tasks.len()))]
    pub async fn drain(mut self, timeout: Duration) -> Result<DrainStats, ProducerError> {
        let deadline = Instant::now() + timeout;
        let mut resolved: u64 = 0;

        loop {
            let next = tokio::time::timeout_at(deadline, self.tasks.join_next()).await;
            match next {
                Ok(Some(Ok(Ok(_ack)))) => resolved += 1,
                Ok(Some(Ok(Err(failure)))) => {
                    self.tasks.abort_all();
                    return Err(ProducerError::delivery_failed(failure));
                }
                Ok(Some(Err(join_error))) => {
                    warn!(%join_error, "completion task aborted");
                }
                Ok(None) => {
                    return Ok(DrainStats {
                        resolved,
                        abandoned: 0,
                    });
                }
                Err(_) => {
                    let abandoned = self.tasks.len() as u64;
                    warn!(
                        resolved,
                        abandoned, "drain deadline elapsed, abandoning unresolved completions"
                    );
                    metrics::counter!("streambench_puts_abandoned_total").increment(abandoned);
                    self.tasks.abort_all();
                    return Ok(DrainStats {
                        resolved,
                        abandoned,
                    });
                }
            }
        }
    }
}
