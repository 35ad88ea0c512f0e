//! 配置校验模块
//!
//! 校验规则：
//! - stream.name 非空
//! - stream.shard_count >= 1
//! - producer 速率与时长为正 (0 秒的压测没有意义)
//! - consumer.initial_position 可解析 (含 AT_TIMESTAMP 时间戳)
//! - consumer 批大小 / 轮询间隔 / 优雅停机时限为正

use contracts::{BenchConfig, StreamError};

/// 校验 BenchConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &BenchConfig) -> Result<(), StreamError> {
    validate_stream(config)?;
    validate_producer(config)?;
    validate_consumer(config)?;
    Ok(())
}

/// 校验流配置
fn validate_stream(config: &BenchConfig) -> Result<(), StreamError> {
    if config.stream.name.is_empty() {
        return Err(StreamError::config_validation(
            "stream.name",
            "stream name cannot be empty",
        ));
    }

    if config.stream.shard_count == 0 {
        return Err(StreamError::config_validation(
            "stream.shard_count",
            "a stream needs at least one shard",
        ));
    }

    Ok(())
}

/// 校验生产端配置
fn validate_producer(config: &BenchConfig) -> Result<(), StreamError> {
    let producer = &config.producer;

    if producer.seconds_to_run == 0 {
        return Err(StreamError::config_validation(
            "producer.seconds_to_run",
            "seconds_to_run must be a positive integer",
        ));
    }

    if producer.records_per_second == 0 {
        return Err(StreamError::config_validation(
            "producer.records_per_second",
            "records_per_second must be a positive integer",
        ));
    }

    Ok(())
}

/// 校验消费端配置
fn validate_consumer(config: &BenchConfig) -> Result<(), StreamError> {
    let consumer = &config.consumer;

    // 位置解析失败即为配置错误
    consumer.parsed_initial_position()?;

    if consumer.application_name.is_empty() {
        return Err(StreamError::config_validation(
            "consumer.application_name",
            "application name cannot be empty",
        ));
    }

    if consumer.max_batch_size == 0 {
        return Err(StreamError::config_validation(
            "consumer.max_batch_size",
            "max_batch_size must be >= 1",
        ));
    }

    if consumer.poll_interval_ms == 0 {
        return Err(StreamError::config_validation(
            "consumer.poll_interval_ms",
            "poll_interval_ms must be >= 1 (a zero interval busy-spins the reader)",
        ));
    }

    if consumer.graceful_timeout_secs == 0 {
        return Err(StreamError::config_validation(
            "consumer.graceful_timeout_secs",
            "graceful_timeout_secs must be >= 1",
        ));
    }

    Ok(())
}
