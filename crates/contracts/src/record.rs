//! Record - 流记录数据结构
//!
//! 生产端提交的原始记录与消费端看到的已定序记录。

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ShardId;

/// 待发送记录
///
/// 由发射调度器创建，提交给传输层后不可变；分区键只用于分片路由，
/// 不携带业务含义。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 分区键 (通常为发射时刻的毫秒时间戳字符串)
    pub partition_key: String,

    /// 不透明负载
    pub payload: Bytes,
}

impl Record {
    /// 创建记录
    pub fn new(partition_key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            partition_key: partition_key.into(),
            payload: payload.into(),
        }
    }
}

/// 已定序记录 (消费端视角)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedRecord {
    /// 所属分片
    pub shard_id: ShardId,

    /// 分片内严格递增的序号
    pub sequence_number: u64,

    /// 分区键
    pub partition_key: String,

    /// 负载
    pub payload: Bytes,

    /// 到达传输层的时间 (信息性，不参与排序)
    pub arrival_time: DateTime<Utc>,
}

/// 投递成功确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAck {
    /// 记录被路由到的分片
    pub shard_id: ShardId,

    /// 分片内序号
    pub sequence_number: u64,
}

/// 单次投递尝试的错误明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// 错误码
    pub error_code: String,

    /// 错误消息
    pub error_message: String,
}

impl DeliveryAttempt {
    /// 创建一次失败尝试的明细
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }
}

/// 投递失败 (含按时间排列的全部尝试明细)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutFailure {
    /// 全部投递尝试，最后一项为最近一次
    pub attempts: Vec<DeliveryAttempt>,
}

impl PutFailure {
    /// 由尝试列表创建
    pub fn new(attempts: Vec<DeliveryAttempt>) -> Self {
        Self { attempts }
    }

    /// 单次尝试的便捷构造
    pub fn single(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            attempts: vec![DeliveryAttempt::new(error_code, error_message)],
        }
    }

    /// 最近一次尝试的明细
    pub fn last_attempt(&self) -> Option<&DeliveryAttempt> {
        self.attempts.last()
    }
}

impl fmt::Display for PutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_attempt() {
            Some(attempt) => write!(
                f,
                "record put failed after {} attempt(s), last: {} - {}",
                self.attempts.len(),
                attempt.error_code,
                attempt.error_message
            ),
            None => write!(f, "record put failed with no attempt detail"),
        }
    }
}

impl std::error::Error for PutFailure {}

/// 单条记录的终态结果
pub type PutResult = Result<PutAck, PutFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_failure_last_attempt() {
        let failure = PutFailure::new(vec![
            DeliveryAttempt::new("Throttled", "slow down"),
            DeliveryAttempt::new("InternalFailure", "shard unavailable"),
        ]);

        let last = failure.last_attempt().unwrap();
        assert_eq!(last.error_code, "InternalFailure");
        assert!(failure.to_string().contains("after 2 attempt(s)"));
        assert!(failure.to_string().contains("shard unavailable"));
    }

    #[test]
    fn test_record_payload_is_opaque() {
        let record = Record::new("1724580000000", Bytes::from_static(b"{\"id\":1}"));
        assert_eq!(record.partition_key, "1724580000000");
        assert_eq!(&record.payload[..], b"{\"id\":1}");
    }
}
