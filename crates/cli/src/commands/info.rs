//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ShardId;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    stream: StreamInfo,
    producer: ProducerInfo,
    consumer: ConsumerInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    shard_ids: Vec<String>,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    region: String,
    shard_count: usize,
    enhanced_fanout: bool,
}

#[derive(Serialize)]
struct ProducerInfo {
    records_per_second: u64,
    seconds_to_run: u64,
    target_total: u64,
}

#[derive(Serialize)]
struct ConsumerInfo {
    application_name: String,
    initial_position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    at_timestamp: Option<String>,
    graceful_timeout_secs: u64,
    max_batch_size: usize,
    poll_interval_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let bench = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&bench, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&bench, args);
    }

    Ok(())
}

fn build_config_info(bench: &contracts::BenchConfig, args: &InfoArgs) -> ConfigInfo {
    let shard_ids = if args.shards {
        (0..bench.stream.shard_count)
            .map(|n| ShardId::from_index(n).to_string())
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", bench.version),
        stream: StreamInfo {
            name: bench.stream.name.clone(),
            region: bench.stream.region.clone(),
            shard_count: bench.stream.shard_count,
            enhanced_fanout: bench.stream.enhanced_fanout,
        },
        producer: ProducerInfo {
            records_per_second: bench.producer.records_per_second,
            seconds_to_run: bench.producer.seconds_to_run,
            target_total: bench.producer.target_total(),
        },
        consumer: ConsumerInfo {
            application_name: bench.consumer.application_name.clone(),
            initial_position: bench.consumer.initial_position.clone(),
            at_timestamp: bench.consumer.at_timestamp.clone(),
            graceful_timeout_secs: bench.consumer.graceful_timeout_secs,
            max_batch_size: bench.consumer.max_batch_size,
            poll_interval_ms: bench.consumer.poll_interval_ms,
        },
        shard_ids,
    }
}

fn print_config_info(bench: &contracts::BenchConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               streambench Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Stream info
    println!("📍 Stream");
    println!("   ├─ Version: {:?}", bench.version);
    println!("   ├─ Name: {}", bench.stream.name);
    println!("   ├─ Region: {}", bench.stream.region);
    println!("   ├─ Shards: {}", bench.stream.shard_count);
    if bench.stream.enhanced_fanout {
        println!("   └─ Delivery: enhanced fan-out");
    } else {
        println!("   └─ Delivery: polling");
    }

    // Producer
    println!("\n📤 Producer");
    println!(
        "   ├─ Rate: {} records/s",
        bench.producer.records_per_second
    );
    println!("   ├─ Window: {} s", bench.producer.seconds_to_run);
    println!(
        "   └─ Target total: {} records",
        bench.producer.target_total()
    );

    // Consumer
    println!("\n📥 Consumer");
    println!("   ├─ Application: {}", bench.consumer.application_name);
    println!(
        "   ├─ Initial position: {}",
        bench.consumer.initial_position
    );
    if let Some(ref at) = bench.consumer.at_timestamp {
        println!("   ├─ At timestamp: {}", at);
    }
    println!(
        "   ├─ Graceful timeout: {} s",
        bench.consumer.graceful_timeout_secs
    );
    println!("   ├─ Max batch size: {}", bench.consumer.max_batch_size);
    println!(
        "   └─ Poll interval: {} ms",
        bench.consumer.poll_interval_ms
    );

    // Shards
    if args.shards {
        println!("\n🧩 Shards ({})", bench.stream.shard_count);
        for n in 0..bench.stream.shard_count {
            let is_last = n == bench.stream.shard_count - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {}", prefix, ShardId::from_index(n));
        }
    }

    println!();
}
