//! Mock 流传输实现
//!
//! 进程内分片日志：同步提交、异步投递，支持注入投递失败场景。

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use chrono::{DateTime, Utc};
use contracts::{
    PutAck, PutFailure, PutHandle, PutResolver, Record, RecordTransport, SequencedRecord, ShardId,
    StreamError,
};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, instrument, trace};

/// 注入的投递故障
#[derive(Debug, Default, Clone)]
pub struct StreamFaults {
    /// 应该失败的 put 提交序号 (1-based)
    pub fail_puts: Vec<u64>,
    /// 注入失败使用的错误码 (默认 "InternalFailure")
    pub error_code: String,
}

impl StreamFaults {
    fn error_code(&self) -> &str {
        if self.error_code.is_empty() {
            "InternalFailure"
        } else {
            &self.error_code
        }
    }
}

/// 一条等待投递的记录
struct PendingPut {
    index: u64,
    record: Record,
    resolver: PutResolver,
}

struct ShardLog {
    id: ShardId,
    records: Vec<SequencedRecord>,
}

struct StreamState {
    shards: Vec<ShardLog>,
    sealed: bool,
    accepted: u64,
}

/// InMemoryStream 构造器
pub struct InMemoryStreamBuilder {
    name: String,
    shard_count: usize,
    delivery_latency: Duration,
    faults: StreamFaults,
}

impl InMemoryStreamBuilder {
    /// 每条记录的统一投递延迟
    pub fn delivery_latency(mut self, latency: Duration) -> Self {
        self.delivery_latency = latency;
        self
    }

    /// 注入投递故障
    pub fn faults(mut self, faults: StreamFaults) -> Self {
        self.faults = faults;
        self
    }

    /// 构建流并启动投递任务
    ///
    /// 需要在 tokio 运行时内调用。
    pub fn build(self) -> Arc<InMemoryStream> {
        let (put_tx, put_rx) = async_channel::unbounded();
        let (delivered_tx, delivered_rx) = watch::channel(0u64);

        let shards = (0..self.shard_count)
            .map(|n| ShardLog {
                id: ShardId::from_index(n),
                records: Vec::new(),
            })
            .collect();

        let stream = Arc::new(InMemoryStream {
            name: self.name,
            state: Mutex::new(StreamState {
                shards,
                sealed: false,
                accepted: 0,
            }),
            put_tx,
            delivered_rx,
            appended: Notify::new(),
        });

        tokio::spawn(delivery_loop(
            stream.clone(),
            put_rx,
            delivered_tx,
            self.delivery_latency,
            self.faults,
        ));

        stream
    }
}

/// 进程内分片流
///
/// `put_record` 立即返回句柄，后台投递任务负责分片路由、落盘与句柄回执，
/// 与调度任务完全解耦。
pub struct InMemoryStream {
    name: String,
    state: Mutex<StreamState>,
    put_tx: Sender<PendingPut>,
    delivered_rx: watch::Receiver<u64>,
    appended: Notify,
}

impl InMemoryStream {
    /// 创建构造器
    pub fn builder(name: impl Into<String>, shard_count: usize) -> InMemoryStreamBuilder {
        InMemoryStreamBuilder {
            name: name.into(),
            shard_count,
            delivery_latency: Duration::ZERO,
            faults: StreamFaults::default(),
        }
    }

    /// 分片数量
    pub fn shard_count(&self) -> usize {
        self.state.lock().unwrap().shards.len()
    }

    /// 全部分片 ID
    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.state
            .lock()
            .unwrap()
            .shards
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    /// 封闭流：拒绝后续 put，投递队列排空后各分片到达末尾
    pub fn seal(&self) {
        let mut state = self.state.lock().unwrap();
        if state.sealed {
            return;
        }
        state.sealed = true;
        self.put_tx.close();
        drop(state);

        info!(stream = %self.name, "stream sealed");
        // 唤醒等待新记录的 reader，让它们观察到封闭状态
        self.appended.notify_waiters();
    }

    /// 是否已封闭
    pub fn is_sealed(&self) -> bool {
        self.state.lock().unwrap().sealed
    }

    /// 已接受的 put 数
    pub fn accepted_count(&self) -> u64 {
        self.state.lock().unwrap().accepted
    }

    /// 已到达终态的 put 数 (成功或失败)
    pub fn delivered_count(&self) -> u64 {
        *self.delivered_rx.borrow()
    }

    /// 等待新记录落盘或流状态变化
    pub(crate) async fn wait_for_append(&self) {
        self.appended.notified().await;
    }

    /// 读取一个分片从 `from_sequence` 起最多 `max` 条记录
    pub(crate) fn read_from(
        &self,
        shard_index: usize,
        from_sequence: u64,
        max: usize,
    ) -> Vec<SequencedRecord> {
        let state = self.state.lock().unwrap();
        let Some(shard) = state.shards.get(shard_index) else {
            return Vec::new();
        };
        let start = (from_sequence as usize).min(shard.records.len());
        let end = (start + max).min(shard.records.len());
        shard.records[start..end].to_vec()
    }

    /// 分片下一个待分配序号
    pub(crate) fn next_sequence(&self, shard_index: usize) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .shards
            .get(shard_index)
            .map(|s| s.records.len() as u64)
            .unwrap_or(0)
    }

    /// 第一条到达时间不早于 `ts` 的记录序号
    pub(crate) fn sequence_at_timestamp(&self, shard_index: usize, ts: DateTime<Utc>) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .shards
            .get(shard_index)
            .map(|s| s.records.partition_point(|r| r.arrival_time < ts) as u64)
            .unwrap_or(0)
    }

    /// 分片是否已消费完毕：流封闭、投递排空且 reader 追平
    pub(crate) fn fully_consumed(&self, shard_index: usize, next_sequence: u64) -> bool {
        let state = self.state.lock().unwrap();
        if !state.sealed || self.delivered_count() < state.accepted {
            return false;
        }
        state
            .shards
            .get(shard_index)
            .map(|s| next_sequence >= s.records.len() as u64)
            .unwrap_or(true)
    }

    fn shard_index_for(&self, partition_key: &str, shard_count: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        partition_key.hash(&mut hasher);
        (hasher.finish() % shard_count as u64) as usize
    }
}

impl RecordTransport for InMemoryStream {
    fn stream_name(&self) -> &str {
        &self.name
    }

    fn put_record(&self, record: Record) -> Result<PutHandle, StreamError> {
        let (resolver, handle) = PutHandle::pair();

        // 锁内检查 + 入队，seal 无法插入二者之间
        let mut state = self.state.lock().unwrap();
        if state.sealed {
            return Err(StreamError::stream_closed(&self.name));
        }
        let index = state.accepted + 1;
        let pending = PendingPut {
            index,
            record,
            resolver,
        };
        self.put_tx
            .try_send(pending)
            .map_err(|_| StreamError::put_rejected(&self.name, "delivery queue closed"))?;
        state.accepted = index;

        trace!(stream = %self.name, accepted = index, "record queued");
        Ok(handle)
    }

    async fn flush(&self) -> Result<(), StreamError> {
        let target = self.accepted_count();
        let mut delivered = self.delivered_rx.clone();
        delivered
            .wait_for(|d| *d >= target)
            .await
            .map_err(|_| StreamError::Other("delivery task stopped before drain".into()))?;
        Ok(())
    }
}

/// 后台投递循环
///
/// 逐条消费 put 队列：可选延迟、故障注入、分片追加、句柄回执。
#[instrument(name = "stream_delivery", skip_all, fields(stream = %stream.name))]
async fn delivery_loop(
    stream: Arc<InMemoryStream>,
    put_rx: Receiver<PendingPut>,
    delivered_tx: watch::Sender<u64>,
    latency: Duration,
    faults: StreamFaults,
) {
    while let Ok(pending) = put_rx.recv().await {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = if faults.fail_puts.contains(&pending.index) {
            debug!(index = pending.index, "injected delivery failure");
            Err(PutFailure::single(
                faults.error_code(),
                format!("injected failure for put #{}", pending.index),
            ))
        } else {
            Ok(append_record(&stream, pending.record))
        };

        pending.resolver.resolve(result);
        delivered_tx.send_modify(|d| *d += 1);
        stream.appended.notify_waiters();
    }

    debug!("delivery loop drained");
}

fn append_record(stream: &InMemoryStream, record: Record) -> PutAck {
    let mut state = stream.state.lock().unwrap();
    let shard_count = state.shards.len();
    let index = stream.shard_index_for(&record.partition_key, shard_count);
    let shard = &mut state.shards[index];

    let sequence_number = shard.records.len() as u64;
    let ack = PutAck {
        shard_id: shard.id.clone(),
        sequence_number,
    };
    shard.records.push(SequencedRecord {
        shard_id: shard.id.clone(),
        sequence_number,
        partition_key: record.partition_key,
        payload: record.payload,
        arrival_time: Utc::now(),
    });
    ack
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(key: &str) -> Record {
        Record::new(key, Bytes::from_static(b"{}"))
    }

    #[tokio::test]
    async fn test_put_resolves_with_ack() {
        let stream = InMemoryStream::builder("t", 2).build();
        let handle = stream.put_record(record("k1")).unwrap();
        let ack = handle.outcome().await.unwrap();
        assert_eq!(ack.sequence_number, 0);
        assert_eq!(stream.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_same_key_routes_to_same_shard() {
        let stream = InMemoryStream::builder("t", 4).build();
        let a = stream.put_record(record("fixed")).unwrap();
        let b = stream.put_record(record("fixed")).unwrap();
        let ack_a = a.outcome().await.unwrap();
        let ack_b = b.outcome().await.unwrap();
        assert_eq!(ack_a.shard_id, ack_b.shard_id);
        assert_eq!(ack_b.sequence_number, ack_a.sequence_number + 1);
    }

    #[tokio::test]
    async fn test_flush_waits_for_all_outcomes() {
        let stream = InMemoryStream::builder("t", 1)
            .delivery_latency(Duration::from_millis(2))
            .build();
        let mut handles = Vec::new();
        for i in 0..10 {
            handles.push(stream.put_record(record(&format!("k{i}"))).unwrap());
        }
        stream.flush().await.unwrap();
        assert_eq!(stream.delivered_count(), 10);
        for handle in handles {
            assert!(handle.outcome().await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_injected_failure_reaches_handle() {
        let stream = InMemoryStream::builder("t", 1)
            .faults(StreamFaults {
                fail_puts: vec![2],
                error_code: "ProvisionedThroughputExceeded".into(),
            })
            .build();

        let first = stream.put_record(record("a")).unwrap();
        let second = stream.put_record(record("b")).unwrap();

        assert!(first.outcome().await.is_ok());
        let failure = second.outcome().await.unwrap_err();
        assert_eq!(
            failure.last_attempt().unwrap().error_code,
            "ProvisionedThroughputExceeded"
        );
    }

    #[tokio::test]
    async fn test_sealed_stream_rejects_puts() {
        let stream = InMemoryStream::builder("t", 1).build();
        stream.put_record(record("a")).unwrap();
        stream.seal();

        let err = stream.put_record(record("b")).unwrap_err();
        assert!(matches!(err, StreamError::StreamClosed { .. }));

        // Already-accepted records still drain
        stream.flush().await.unwrap();
        assert_eq!(stream.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_read_from_returns_sequence_slice() {
        let stream = InMemoryStream::builder("t", 1).build();
        for i in 0..5 {
            stream.put_record(record(&format!("k{i}"))).unwrap();
        }
        stream.flush().await.unwrap();

        let batch = stream.read_from(0, 2, 2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].sequence_number, 2);
        assert_eq!(batch[1].sequence_number, 3);

        assert!(stream.read_from(0, 5, 10).is_empty());
    }

    #[tokio::test]
    async fn test_fully_consumed_requires_seal_and_catchup() {
        let stream = InMemoryStream::builder("t", 1).build();
        stream.put_record(record("a")).unwrap();
        stream.flush().await.unwrap();

        assert!(!stream.fully_consumed(0, 1), "not sealed yet");
        stream.seal();
        assert!(!stream.fully_consumed(0, 0), "reader not caught up");
        assert!(stream.fully_consumed(0, 1));
    }
}
