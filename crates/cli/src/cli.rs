//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// streambench - Rate-governed stream load generator and checkpointed consumer
#[derive(Parser, Debug)]
#[command(
    name = "streambench",
    author,
    version,
    about = "Stream load generator and checkpointed shard consumer",
    long_about = "A benchmark harness for sharded record streams.\n\n\
                  Emits synthetic records at a configured rate over a bounded \n\
                  window, consumes them with one checkpointed processor per \n\
                  shard, and reports end-to-end statistics."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAMBENCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STREAMBENCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "bench.toml", env = "STREAMBENCH_CONFIG")]
    pub config: PathBuf,

    /// Which side of the benchmark to run
    #[arg(
        long,
        value_enum,
        default_value = "full",
        env = "STREAMBENCH_MODE"
    )]
    pub mode: RunMode,

    /// Override producer emission rate from configuration
    #[arg(long, env = "STREAMBENCH_RECORDS_PER_SECOND")]
    pub records_per_second: Option<u64>,

    /// Override producer run window in seconds from configuration
    #[arg(long, env = "STREAMBENCH_SECONDS_TO_RUN")]
    pub seconds_to_run: Option<u64>,

    /// Override stream shard count from configuration
    #[arg(long, env = "STREAMBENCH_SHARDS")]
    pub shards: Option<usize>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size for shard event queues
    #[arg(long, default_value = "100", env = "STREAMBENCH_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "STREAMBENCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bench.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bench.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List the shard ids the stream would be created with
    #[arg(long)]
    pub shards: bool,
}

/// Which side of the benchmark a run exercises
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Emit records only
    Produce,
    /// Consume only, until interrupted
    Consume,
    /// Emit and consume in one process
    #[default]
    Full,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
