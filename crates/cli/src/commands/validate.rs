//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    stream: String,
    shard_count: usize,
    records_per_second: u64,
    seconds_to_run: u64,
    target_total: u64,
    initial_position: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(bench) => {
            let warnings = collect_warnings(&bench);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", bench.version),
                    stream: bench.stream.name.clone(),
                    shard_count: bench.stream.shard_count,
                    records_per_second: bench.producer.records_per_second,
                    seconds_to_run: bench.producer.seconds_to_run,
                    target_total: bench.producer.target_total(),
                    initial_position: bench.consumer.initial_position.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(bench: &contracts::BenchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // An AT_TIMESTAMP companion on another position is silently ignored
    if bench.consumer.at_timestamp.is_some() && bench.consumer.initial_position != "AT_TIMESTAMP" {
        warnings.push(format!(
            "at_timestamp is set but initial_position is '{}' - the timestamp will be ignored",
            bench.consumer.initial_position
        ));
    }

    if bench.consumer.initial_position == "LATEST" {
        warnings.push(
            "initial_position LATEST skips records emitted before the consumers attach".to_string(),
        );
    }

    // The in-process stream retains every record of the run
    if bench.producer.target_total() > 10_000_000 {
        warnings.push(format!(
            "target total of {} records is held in memory for the whole run",
            bench.producer.target_total()
        ));
    }

    if bench.stream.shard_count == 1 {
        warnings.push("a single shard serializes all consumption".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Stream: {}", summary.stream);
            println!("  Shards: {}", summary.shard_count);
            println!("  Rate: {} records/s", summary.records_per_second);
            println!("  Window: {} s", summary.seconds_to_run);
            println!("  Target total: {} records", summary.target_total);
            println!("  Initial position: {}", summary.initial_position);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
