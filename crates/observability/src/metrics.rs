//! 消费侧指标收集模块
//!
//! 记录处理器回调看到的记录与批次观测值，并在内存中聚合出运行摘要。

use std::collections::HashMap;

use contracts::SequencedRecord;
use metrics::{counter, gauge, histogram};

/// 记录一条已交付处理回调的记录
///
/// 每条记录通过处理器回调时调用此函数来记录指标。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_handled;
///
/// for record in &batch.records {
///     record_handled(record);
///     // ...
/// }
/// ```
pub fn record_handled(record: &SequencedRecord) {
    counter!(
        "streambench_handled_records_total",
        "shard_id" => record.shard_id.to_string()
    )
    .increment(1);

    // 负载大小分布
    histogram!("streambench_payload_bytes").record(record.payload.len() as f64);

    // 分片读取进度 (用于检测停滞的分片)
    gauge!(
        "streambench_shard_sequence",
        "shard_id" => record.shard_id.to_string()
    )
    .set(record.sequence_number as f64);
}

/// 记录一个到达处理器的批次
///
/// `millis_behind_latest` 为批尾相对流尾的追赶距离。
pub fn record_batch(shard_id: &str, batch_size: usize, millis_behind_latest: u64) {
    counter!(
        "streambench_batches_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);

    histogram!("streambench_batch_size").record(batch_size as f64);

    gauge!(
        "streambench_shard_lag_millis",
        "shard_id" => shard_id.to_string()
    )
    .set(millis_behind_latest as f64);
}

/// 运行指标聚合器
///
/// 在内存中聚合一次运行的消费侧观测值，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    /// 总批次数
    pub total_batches: u64,

    /// 总记录数
    pub total_records: u64,

    /// 总负载字节数
    pub total_bytes: u64,

    /// 批大小统计
    pub batch_size_stats: RunningStats,

    /// 追赶距离统计 (毫秒)
    pub lag_stats: RunningStats,

    /// 负载大小统计 (字节)
    pub payload_stats: RunningStats,

    /// 各分片记录数
    pub shard_record_counts: HashMap<String, u64>,
}

impl RunMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新一条记录的观测值
    pub fn update_record(&mut self, record: &SequencedRecord) {
        self.total_records += 1;
        self.total_bytes += record.payload.len() as u64;
        self.payload_stats.push(record.payload.len() as f64);

        *self
            .shard_record_counts
            .entry(record.shard_id.to_string())
            .or_insert(0) += 1;
    }

    /// 更新一个批次的观测值
    pub fn update_batch(&mut self, batch_size: usize, millis_behind_latest: u64) {
        self.total_batches += 1;
        self.batch_size_stats.push(batch_size as f64);
        self.lag_stats.push(millis_behind_latest as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            total_records: self.total_records,
            total_bytes: self.total_bytes,
            records_per_batch: if self.total_batches > 0 {
                self.total_records as f64 / self.total_batches as f64
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size_stats),
            lag_millis: StatsSummary::from(&self.lag_stats),
            payload_bytes: StatsSummary::from(&self.payload_stats),
            shard_record_counts: self.shard_record_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub total_records: u64,
    pub total_bytes: u64,
    pub records_per_batch: f64,
    pub batch_size: StatsSummary,
    pub lag_millis: StatsSummary,
    pub payload_bytes: StatsSummary,
    pub shard_record_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Metrics Summary ===")?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(
            f,
            "Total batches: {} ({:.2} records/batch)",
            self.total_batches, self.records_per_batch
        )?;
        writeln!(f, "Total payload bytes: {}", self.total_bytes)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Catch-up lag (ms): {}", self.lag_millis)?;
        writeln!(f, "Payload size (bytes): {}", self.payload_bytes)?;

        if !self.shard_record_counts.is_empty() {
            writeln!(f, "Per-shard record counts:")?;
            let mut shards: Vec<_> = self.shard_record_counts.iter().collect();
            shards.sort_by(|a, b| a.0.cmp(b.0));
            for (shard, count) in shards {
                writeln!(f, "  {}: {}", shard, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
