//! Shared run counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Attempt and completion counters shared by the scheduler, the completion
/// sink and the progress reporter.
///
/// `attempted` counts emit invocations; `completed` counts terminal put
/// outcomes (ack or failure). Both only ever increase, and `completed`
/// trails `attempted` because every completion belongs to a prior attempt.
#[derive(Debug, Default)]
pub struct PutCounters {
    attempted: AtomicU64,
    completed: AtomicU64,
}

impl PutCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count one emit invocation, returning the new total.
    pub fn record_attempt(&self) -> u64 {
        self.attempted.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one terminal put outcome, returning the new total.
    pub fn record_completion(&self) -> u64 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}
