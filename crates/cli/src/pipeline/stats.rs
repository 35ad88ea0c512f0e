//! Benchmark run statistics.

use std::time::Duration;

use consumer::{ShardReport, ShutdownSummary};
use observability::RunMetricsAggregator;
use producer::EmissionReport;

/// Counters and observations collected over one benchmark run
#[derive(Debug, Clone, Default)]
pub struct BenchStats {
    /// Planned number of records for the emission window
    pub target_total: u64,

    /// Emission attempts made by the scheduler
    pub records_emitted: u64,

    /// Puts that reached a successful terminal outcome
    pub puts_completed: u64,

    /// Puts still unresolved when the drain deadline passed
    pub puts_abandoned: u64,

    /// True when the emission window was closed early
    pub emission_aborted: bool,

    /// Number of supervised consumer shards
    pub active_shards: usize,

    /// Records processed across all shards
    pub records_processed: u64,

    /// Records skipped after exhausting their retries
    pub records_skipped: u64,

    /// Checkpoints committed across all shards
    pub checkpoints_committed: u64,

    /// True when graceful shutdown hit its deadline
    pub shards_timed_out: bool,

    /// Per-shard lifetime reports
    pub shard_reports: Vec<ShardReport>,

    /// Consumer-side batch and record observations
    pub run_metrics: RunMetricsAggregator,

    /// Wall-clock duration of the whole run
    pub duration: Duration,
}

impl BenchStats {
    /// Copy the producer-side counters out of an emission report
    pub fn absorb_emission(&mut self, report: &EmissionReport) {
        self.target_total = report.target_total;
        self.records_emitted = report.attempted;
        self.puts_completed = report.completed;
        self.puts_abandoned = report.abandoned;
        self.emission_aborted = report.aborted;
    }

    /// Copy the consumer-side counters out of a shutdown summary
    pub fn absorb_shutdown(&mut self, summary: &ShutdownSummary) {
        self.records_processed = summary.records_processed();
        self.records_skipped = summary.records_skipped();
        self.checkpoints_committed = summary.checkpoints_committed();
        self.shards_timed_out = summary.timed_out;
        self.shard_reports = summary.reports.clone();
    }

    /// Emission attempts per second over the whole run
    pub fn emit_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.records_emitted as f64 / secs
        } else {
            0.0
        }
    }

    /// Records processed per second over the whole run
    pub fn consume_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.records_processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of attempted puts that completed, as a percentage
    #[allow(dead_code)]
    pub fn completion_rate(&self) -> f64 {
        if self.records_emitted > 0 {
            (self.puts_completed as f64 / self.records_emitted as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Benchmark Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Emitted: {}", self.records_emitted);
        println!("   ├─ Processed: {}", self.records_processed);
        println!("   └─ Active shards: {}", self.active_shards);

        if self.target_total > 0 {
            println!("\n📤 Producer");
            println!("   ├─ Target total: {}", self.target_total);
            println!("   ├─ Attempted: {}", self.records_emitted);
            println!("   ├─ Completed: {}", self.puts_completed);
            println!("   ├─ Abandoned: {}", self.puts_abandoned);
            println!(
                "   ├─ Window closed early: {}",
                if self.emission_aborted { "yes" } else { "no" }
            );
            println!("   └─ Rate: {:.2} records/s", self.emit_rate());
        }

        if self.active_shards > 0 {
            let summary = self.run_metrics.summary();

            println!("\n📥 Consumer");
            println!("   ├─ Processed: {}", self.records_processed);
            println!("   ├─ Skipped: {}", self.records_skipped);
            println!("   ├─ Checkpoints: {}", self.checkpoints_committed);
            println!("   ├─ Batch size: {}", summary.batch_size);
            println!("   ├─ Lag (ms): {}", summary.lag_millis);
            println!("   └─ Rate: {:.2} records/s", self.consume_rate());

            if self.shards_timed_out {
                println!("\n⚠️  Graceful shutdown timed out; some shards were aborted");
            }

            if !self.shard_reports.is_empty() {
                println!("\n🧩 Shards ({})", self.shard_reports.len());
                for (i, report) in self.shard_reports.iter().enumerate() {
                    let prefix = if i == self.shard_reports.len() - 1 {
                        "└─"
                    } else {
                        "├─"
                    };
                    let reason = report
                        .shutdown_reason
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "channel closed".to_string());
                    println!(
                        "   {} {}: processed={}, skipped={}, checkpoints={}, shutdown={}",
                        prefix,
                        report.shard_id,
                        report.records_processed,
                        report.records_skipped,
                        report.checkpoints_committed,
                        reason
                    );
                }
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_over_duration() {
        let stats = BenchStats {
            records_emitted: 1000,
            records_processed: 800,
            duration: Duration::from_secs(10),
            ..BenchStats::default()
        };

        assert!((stats.emit_rate() - 100.0).abs() < f64::EPSILON);
        assert!((stats.consume_rate() - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_duration_yields_zero_rates() {
        let stats = BenchStats::default();
        assert_eq!(stats.emit_rate(), 0.0);
        assert_eq!(stats.consume_rate(), 0.0);
        assert_eq!(stats.completion_rate(), 0.0);
    }

    #[test]
    fn test_completion_rate() {
        let stats = BenchStats {
            records_emitted: 200,
            puts_completed: 150,
            ..BenchStats::default()
        };
        assert!((stats.completion_rate() - 75.0).abs() < f64::EPSILON);
    }
}
