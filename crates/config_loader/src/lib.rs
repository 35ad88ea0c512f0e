//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `BenchConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("bench.toml")).unwrap();
//! println!("Stream: {}", config.stream.name);
//! ```

mod parser;
mod validator;

pub use contracts::BenchConfig;
pub use parser::ConfigFormat;
pub use validator::validate;

use contracts::StreamError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<BenchConfig, StreamError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<BenchConfig, StreamError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize BenchConfig to TOML string
    pub fn to_toml(config: &BenchConfig) -> Result<String, StreamError> {
        toml::to_string_pretty(config)
            .map_err(|e| StreamError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize BenchConfig to JSON string
    pub fn to_json(config: &BenchConfig) -> Result<String, StreamError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| StreamError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, StreamError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            StreamError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| StreamError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, StreamError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<BenchConfig, StreamError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[stream]
name = "bench-stream"
shard_count = 2

[producer]
records_per_second = 200
seconds_to_run = 5

[consumer]
initial_position = "TRIM_HORIZON"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.stream.name, "bench-stream");
        assert_eq!(config.stream.shard_count, 2);
        assert_eq!(config.producer.target_total(), 1000);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.stream.name, config2.stream.name);
        assert_eq!(config.producer.records_per_second, config2.producer.records_per_second);
        assert_eq!(config.consumer.initial_position, config2.consumer.initial_position);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.stream.name, config2.stream.name);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Zero-duration producer should fail validation, not parsing
        let content = r#"
[stream]
name = "bench-stream"

[producer]
records_per_second = 100
seconds_to_run = 0
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("positive"));
    }
}
