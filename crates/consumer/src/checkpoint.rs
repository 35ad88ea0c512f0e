//! Bounded checkpoint retry policy
//!
//! Each failure class gets its own treatment: throttling is retried with
//! backoff, lost ownership stops silently, a store rejection stops loudly.
//! None of them crash the shard; a missed checkpoint only risks
//! reprocessing, never data loss.

use contracts::{CheckpointError, Checkpointer};
use tracing::{debug, error, info, warn};

use crate::{MAX_RETRY_ATTEMPTS, RETRY_BACKOFF};

/// Terminal result of one checkpoint attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// Position durably recorded
    Committed,
    /// The lease moved to another worker; the checkpoint is meaningless now
    LeaseGone,
    /// Retries exhausted or the store rejected the position
    GaveUp,
}

impl CheckpointOutcome {
    pub fn is_committed(self) -> bool {
        self == Self::Committed
    }
}

/// Drive one checkpoint to a terminal outcome.
///
/// Throttled failures back off [`RETRY_BACKOFF`] between attempts, bounded
/// at [`MAX_RETRY_ATTEMPTS`]; the sleep sits between attempts, so ten
/// attempts cost nine backoffs.
pub async fn checkpoint_with_retries(checkpointer: &dyn Checkpointer) -> CheckpointOutcome {
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        let error = match checkpointer.checkpoint() {
            Ok(()) => {
                debug!(attempt, "checkpoint committed");
                metrics::counter!("streambench_checkpoints_total", "outcome" => "committed")
                    .increment(1);
                return CheckpointOutcome::Committed;
            }
            Err(error) => error,
        };

        match error {
            CheckpointError::LeaseGone { .. } => {
                info!(%error, "shard ownership moved, dropping checkpoint");
                metrics::counter!("streambench_checkpoints_total", "outcome" => "lease_gone")
                    .increment(1);
                return CheckpointOutcome::LeaseGone;
            }
            CheckpointError::Throttled { .. } => {
                warn!(attempt, %error, "checkpoint throttled");
                if attempt < MAX_RETRY_ATTEMPTS {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
            CheckpointError::StoreInvalid { .. } => {
                error!(%error, "checkpoint position rejected by store");
                metrics::counter!("streambench_checkpoints_total", "outcome" => "gave_up")
                    .increment(1);
                return CheckpointOutcome::GaveUp;
            }
        }
    }

    error!(
        attempts = MAX_RETRY_ATTEMPTS,
        "checkpoint retries exhausted, giving up"
    );
    metrics::counter!("streambench_checkpoints_total", "outcome" => "gave_up").increment(1);
    CheckpointOutcome::GaveUp
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Checkpointer that pops scripted errors, then succeeds.
    struct ScriptedCheckpointer {
        script: Mutex<VecDeque<CheckpointError>>,
        calls: AtomicU64,
    }

    impl ScriptedCheckpointer {
        fn new(script: Vec<CheckpointError>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU64::new(0),
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl Checkpointer for ScriptedCheckpointer {
        fn checkpoint(&self) -> Result<(), CheckpointError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.script.lock().unwrap().pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    fn throttled_times(n: usize) -> Vec<CheckpointError> {
        (0..n)
            .map(|_| CheckpointError::throttled("rate exceeded"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_nine_throttles_then_success_commits() {
        let checkpointer = ScriptedCheckpointer::new(throttled_times(9));

        let start = Instant::now();
        let outcome = checkpoint_with_retries(&checkpointer).await;

        assert!(outcome.is_committed());
        assert_eq!(checkpointer.calls(), 10);
        // Nine backoffs of 3 s each, none after the success
        assert_eq!(start.elapsed(), Duration::from_secs(27));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_throttle_gives_up_after_budget() {
        let checkpointer = ScriptedCheckpointer::new(throttled_times(20));

        let start = Instant::now();
        let outcome = checkpoint_with_retries(&checkpointer).await;

        assert_eq!(outcome, CheckpointOutcome::GaveUp);
        assert_eq!(checkpointer.calls(), 10);
        assert_eq!(start.elapsed(), Duration::from_secs(27));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_gone_stops_immediately() {
        let checkpointer =
            ScriptedCheckpointer::new(vec![CheckpointError::lease_gone("lease reassigned")]);

        let start = Instant::now();
        let outcome = checkpoint_with_retries(&checkpointer).await;

        assert_eq!(outcome, CheckpointOutcome::LeaseGone);
        assert_eq!(checkpointer.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_invalid_not_retried() {
        let checkpointer =
            ScriptedCheckpointer::new(vec![CheckpointError::store_invalid("position regressed")]);

        let outcome = checkpoint_with_retries(&checkpointer).await;

        assert_eq!(outcome, CheckpointOutcome::GaveUp);
        assert_eq!(checkpointer.calls(), 1);
    }
}
