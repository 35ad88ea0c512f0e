//! Target-rate emission scheduler
//!
//! Fires a caller-supplied emit function exactly `records_per_second ×
//! seconds_to_run` times over the run window. Every tick recomputes how many
//! emissions are due from one monotonic clock origin, so a delayed tick
//! catches up with a burst instead of under-delivering.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{ProducerError, PutCounters};

const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Builder for [`EmissionScheduler`].
pub struct EmissionSchedulerBuilder {
    records_per_second: u64,
    seconds_to_run: u64,
    tick_period: Duration,
    counters: Option<Arc<PutCounters>>,
    abort: Option<CancellationToken>,
}

impl EmissionSchedulerBuilder {
    /// Tick period of the underlying timer. The due computation absorbs
    /// timer jitter, so a coarse period changes burst sizes, not the total.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Share the attempt counter with a sink and a progress reporter.
    pub fn counters(mut self, counters: Arc<PutCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Run-wide abort token; cancelling it stops the scheduler between
    /// bursts, and an emit error cancels it for everyone else.
    pub fn abort(mut self, abort: CancellationToken) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn build(self) -> Result<EmissionScheduler, ProducerError> {
        if self.seconds_to_run == 0 {
            return Err(ProducerError::invalid_run_window(
                "seconds_to_run must be a positive integer",
            ));
        }
        if self.records_per_second == 0 {
            return Err(ProducerError::invalid_run_window(
                "records_per_second must be a positive integer",
            ));
        }
        if self.tick_period.is_zero() {
            return Err(ProducerError::invalid_run_window(
                "tick period must be non-zero",
            ));
        }

        Ok(EmissionScheduler {
            records_per_second: self.records_per_second,
            seconds_to_run: self.seconds_to_run,
            tick_period: self.tick_period,
            counters: self.counters.unwrap_or_default(),
            abort: self.abort.unwrap_or_default(),
        })
    }
}

/// Final scheduler accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionOutcome {
    /// Emit invocations actually made
    pub attempted: u64,
    /// `records_per_second × seconds_to_run`
    pub target_total: u64,
    /// True when the abort token stopped the run before the window closed
    pub aborted: bool,
}

/// Wall-clock governed emission loop.
///
/// Single task, no parallel emission workers: serializing emission is what
/// makes the cumulative-rate computation exact.
pub struct EmissionScheduler {
    records_per_second: u64,
    seconds_to_run: u64,
    tick_period: Duration,
    counters: Arc<PutCounters>,
    abort: CancellationToken,
}

impl EmissionScheduler {
    pub fn builder(records_per_second: u64, seconds_to_run: u64) -> EmissionSchedulerBuilder {
        EmissionSchedulerBuilder {
            records_per_second,
            seconds_to_run,
            tick_period: DEFAULT_TICK_PERIOD,
            counters: None,
            abort: None,
        }
    }

    pub fn target_total(&self) -> u64 {
        self.records_per_second.saturating_mul(self.seconds_to_run)
    }

    /// Drive `emit` until the window closes or the run aborts.
    ///
    /// Any emit error is fatal: it is logged, the abort token is cancelled
    /// and the error is returned. A silent throughput gap would invalidate
    /// the whole load run, so there is no partial-failure tolerance here.
    #[instrument(
        name = "emission_scheduler",
        skip_all,
        fields(rate = self.records_per_second, duration_secs = self.seconds_to_run)
    )]
    pub async fn run<F>(self, mut emit: F) -> Result<EmissionOutcome, ProducerError>
    where
        F: FnMut() -> Result<(), ProducerError>,
    {
        let target_total = self.target_total();
        let duration_secs = self.seconds_to_run as f64;
        let rate = self.records_per_second as f64;

        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.tick_period);
        // Catch-up happens through the due computation, not queued ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.abort.cancelled() => {
                    let attempted = self.counters.attempted();
                    warn!(attempted, target_total, "emission aborted before window closed");
                    return Ok(EmissionOutcome {
                        attempted,
                        target_total,
                        aborted: true,
                    });
                }
                _ = ticker.tick() => {}
            }

            let elapsed = start.elapsed().as_secs_f64();
            let due = elapsed.min(duration_secs) * rate;

            let mut burst: u64 = 0;
            while (self.counters.attempted() as f64) < due {
                self.counters.record_attempt();
                burst += 1;
                if let Err(emit_error) = emit() {
                    error!(error = %emit_error, "emit failed, aborting run");
                    self.abort.cancel();
                    return Err(emit_error);
                }
            }
            if burst > 1 {
                metrics::histogram!("streambench_emit_burst").record(burst as f64);
            }

            if elapsed >= duration_secs {
                let attempted = self.counters.attempted();
                info!(attempted, target_total, "emission window closed");
                return Ok(EmissionOutcome {
                    attempted,
                    target_total,
                    aborted: false,
                });
            }
        }
    }
}
