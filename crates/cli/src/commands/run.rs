//! `run` command implementation.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_bench(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut bench = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(rate) = args.records_per_second {
        info!(records_per_second = rate, "Overriding emission rate from CLI");
        bench.producer.records_per_second = rate;
    }
    if let Some(seconds) = args.seconds_to_run {
        info!(seconds_to_run = seconds, "Overriding run window from CLI");
        bench.producer.seconds_to_run = seconds;
    }
    if let Some(shards) = args.shards {
        info!(shard_count = shards, "Overriding shard count from CLI");
        bench.stream.shard_count = shards;
    }

    // Overrides can reintroduce zeros the file-level validation never saw
    config_loader::validate(&bench).context("Configuration invalid after CLI overrides")?;

    info!(
        stream = %bench.stream.name,
        shards = bench.stream.shard_count,
        records_per_second = bench.producer.records_per_second,
        seconds_to_run = bench.producer.seconds_to_run,
        target_total = bench.producer.target_total(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&bench);
        return Ok(());
    }

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        bench,
        mode: args.mode,
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // First signal starts a graceful wind-down; the pipeline decides what
    // that means for each side of the run
    let shutdown = CancellationToken::new();
    let signal_trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Received shutdown signal, winding the run down...");
        signal_trigger.cancel();
    });

    info!(mode = ?args.mode, "Starting benchmark...");

    let stats = pipeline
        .run(shutdown)
        .await
        .context("Benchmark execution failed")?;

    info!(
        emitted = stats.records_emitted,
        completed = stats.puts_completed,
        processed = stats.records_processed,
        duration_secs = stats.duration.as_secs_f64(),
        "Benchmark completed"
    );

    // Print detailed statistics
    stats.print_summary();

    info!("streambench finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(bench: &contracts::BenchConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Stream:");
    println!("  Name: {}", bench.stream.name);
    println!("  Region: {}", bench.stream.region);
    println!("  Shards: {}", bench.stream.shard_count);
    println!("  Enhanced fan-out: {}", bench.stream.enhanced_fanout);

    println!("\nProducer:");
    println!("  Rate: {} records/s", bench.producer.records_per_second);
    println!("  Window: {} s", bench.producer.seconds_to_run);
    println!("  Target total: {} records", bench.producer.target_total());

    println!("\nConsumer:");
    println!("  Application: {}", bench.consumer.application_name);
    println!("  Initial position: {}", bench.consumer.initial_position);
    if let Some(ref at) = bench.consumer.at_timestamp {
        println!("  At timestamp: {}", at);
    }
    println!("  Max batch size: {}", bench.consumer.max_batch_size);
    println!("  Poll interval: {} ms", bench.consumer.poll_interval_ms);
    println!(
        "  Graceful timeout: {} s",
        bench.consumer.graceful_timeout_secs
    );

    println!();
}
