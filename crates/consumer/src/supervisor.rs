//! Shard fleet supervision
//!
//! Owns one processor task per shard plus the per-shard shutdown triggers,
//! and turns "wind down everything" into a bounded wait.

use std::future::Future;
use std::time::Duration;

use contracts::ShardId;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::ShardReport;

struct SupervisedShard {
    shard_id: ShardId,
    shutdown: CancellationToken,
}

/// How a supervised run ended.
#[derive(Debug)]
pub struct ShutdownSummary {
    /// Reports from every shard that terminated in time
    pub reports: Vec<ShardReport>,
    /// True when the bounded wait expired with shards still running
    pub timed_out: bool,
}

impl ShutdownSummary {
    pub fn records_processed(&self) -> u64 {
        self.reports.iter().map(|r| r.records_processed).sum()
    }

    pub fn records_skipped(&self) -> u64 {
        self.reports.iter().map(|r| r.records_skipped).sum()
    }

    pub fn checkpoints_committed(&self) -> u64 {
        self.reports.iter().map(|r| r.checkpoints_committed).sum()
    }
}

/// Runs shard processors to completion and coordinates graceful shutdown.
///
/// Each shard contributes a processor future and a shutdown trigger; firing
/// the trigger must make that shard's source deliver a requested-shutdown
/// signal so the processor can take its final checkpoint.
pub struct ShardSupervisor {
    graceful_timeout: Duration,
    shards: Vec<SupervisedShard>,
    tasks: JoinSet<ShardReport>,
}

impl ShardSupervisor {
    pub fn new(graceful_timeout: Duration) -> Self {
        Self {
            graceful_timeout,
            shards: Vec::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Adopt one shard: its processor future and its shutdown trigger.
    pub fn supervise<F>(&mut self, shard_id: ShardId, shutdown: CancellationToken, processor: F)
    where
        F: Future<Output = ShardReport> + Send + 'static,
    {
        self.shards.push(SupervisedShard { shard_id, shutdown });
        self.tasks.spawn(processor);
    }

    /// Wait for every shard to terminate on its own (shard end, lease loss).
    ///
    /// Borrows the supervisor so a caller can still fall back to
    /// [`begin_graceful_shutdown`](Self::begin_graceful_shutdown) when an
    /// interrupt arrives mid-wait.
    #[instrument(name = "supervisor_join", skip(self), fields(shards = self.shards.len()))]
    pub async fn join_all(&mut self) -> ShutdownSummary {
        let mut reports = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(join_error) => warn!(%join_error, "shard processor task failed"),
            }
        }
        info!(shards = reports.len(), "all shards terminated");
        ShutdownSummary {
            reports,
            timed_out: false,
        }
    }

    /// Ask every shard to wind down, then wait at most the graceful timeout.
    ///
    /// Shards still running at the deadline are aborted; whichever happened
    /// is logged and reported.
    #[instrument(name = "graceful_shutdown", skip(self), fields(shards = self.shards.len()))]
    pub async fn begin_graceful_shutdown(mut self) -> ShutdownSummary {
        for shard in &self.shards {
            info!(shard_id = %shard.shard_id, "requesting shard shutdown");
            shard.shutdown.cancel();
        }

        let deadline = Instant::now() + self.graceful_timeout;
        let mut reports = Vec::new();
        loop {
            let next = tokio::time::timeout_at(deadline, self.tasks.join_next()).await;
            match next {
                Ok(Some(Ok(report))) => reports.push(report),
                Ok(Some(Err(join_error))) => {
                    warn!(%join_error, "shard processor task failed");
                }
                Ok(None) => {
                    info!(shards = reports.len(), "graceful shutdown complete");
                    return ShutdownSummary {
                        reports,
                        timed_out: false,
                    };
                }
                Err(_) => {
                    warn!(
                        pending = self.tasks.len(),
                        timeout_secs = self.graceful_timeout.as_secs(),
                        "graceful shutdown timed out, aborting remaining shards"
                    );
                    self.tasks.abort_all();
                    return ShutdownSummary {
                        reports,
                        timed_out: true,
                    };
                }
            }
        }
    }
}
