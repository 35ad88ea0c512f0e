//! Run progress heartbeat
//!
//! One line per second against the shared counters, in the format the
//! long-lived putter samples always printed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::PutCounters;

const REPORT_PERIOD: Duration = Duration::from_secs(1);

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Periodic progress reporter; lives for the whole run including the drain.
pub struct ProgressReporter;

impl ProgressReporter {
    pub fn spawn(counters: Arc<PutCounters>, target_total: u64) -> ProgressHandle {
        let stop = CancellationToken::new();
        let token = stop.clone();

        let join = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + REPORT_PERIOD, REPORT_PERIOD);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let attempted = counters.attempted();
                let completed = counters.completed();
                info!(
                    "put {} of {} so far ({:.2} %), {} have completed ({:.2} %)",
                    attempted,
                    target_total,
                    percent(attempted, target_total),
                    completed,
                    percent(completed, target_total),
                );
            }
        });

        ProgressHandle { stop, join }
    }
}

/// Stops the reporter task when the run is over.
pub struct ProgressHandle {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

impl ProgressHandle {
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_handles_zero_target() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(30, 60), 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops_cleanly() {
        let counters = PutCounters::new();
        counters.record_attempt();

        let handle = ProgressReporter::spawn(counters, 100);
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.stop().await;
    }
}
