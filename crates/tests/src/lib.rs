//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 进程内 e2e 基准回路（生产 → 流 → 消费）
//! - 关机与租约场景回归

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(
            contracts::ShardId::from_index(3).to_string(),
            "shardId-000000000003"
        );
    }

    #[test]
    fn test_toml_config_reaches_runtime_types() {
        let toml = r#"
[stream]
name = "bench-stream"
shard_count = 2

[producer]
records_per_second = 50
seconds_to_run = 2

[consumer]
initial_position = "TRIM_HORIZON"
"#;
        let config =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(config.producer.target_total(), 100);
        assert_eq!(config.stream.shard_count, 2);
        config.consumer.parsed_initial_position().unwrap();
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use consumer::{ShardProcessor, ShardSupervisor};
    use contracts::{
        InitialPosition, ProducerConfig, RecordHandler, SequencedRecord, ShardId, ShutdownReason,
        StreamError,
    };
    use observability::RunMetricsAggregator;
    use producer::LoadRunner;
    use tokio::sync::mpsc;
    use transport::{
        InMemoryCheckpointStore, InMemoryStream, ReaderOptions, ShardReader, StreamFaults,
    };

    /// Handler that counts every record into shared test state.
    struct CountingHandler {
        processed: Arc<AtomicU64>,
        metrics: Arc<Mutex<RunMetricsAggregator>>,
    }

    impl RecordHandler for CountingHandler {
        async fn handle(&mut self, record: &SequencedRecord) -> Result<(), StreamError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            self.metrics.lock().unwrap().update_record(record);
            Ok(())
        }
    }

    fn handler(processed: &Arc<AtomicU64>) -> CountingHandler {
        CountingHandler {
            processed: processed.clone(),
            metrics: Arc::new(Mutex::new(RunMetricsAggregator::new())),
        }
    }

    fn options() -> ReaderOptions {
        ReaderOptions {
            initial_position: InitialPosition::TrimHorizon,
            max_batch_size: 100,
            poll_interval: Duration::from_millis(20),
            enhanced_fanout: false,
        }
    }

    fn producer_config(records_per_second: u64, seconds_to_run: u64) -> ProducerConfig {
        ProducerConfig {
            records_per_second,
            seconds_to_run,
        }
    }

    async fn wait_until(counter: &AtomicU64, target: u64) {
        for _ in 0..1000 {
            if counter.load(Ordering::SeqCst) >= target {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "stuck at {} records, wanted {target}",
            counter.load(Ordering::SeqCst)
        );
    }

    /// End-to-end: LoadRunner -> InMemoryStream -> ShardReader -> ShardProcessor
    ///
    /// 验证完整的数据流：
    /// 1. 生产侧按速率发出全部记录并等待回执
    /// 2. 封流后各分片自然排空到 ShardEnded
    /// 3. 每个分片落下终点 checkpoint，总量对得上
    #[tokio::test(start_paused = true)]
    async fn test_full_pipeline_drains_to_shard_ends() {
        let stream = InMemoryStream::builder("bench-full", 2).build();
        let store = InMemoryCheckpointStore::new("full-app");
        let processed = Arc::new(AtomicU64::new(0));
        let metrics = Arc::new(Mutex::new(RunMetricsAggregator::new()));

        let mut readers = Vec::new();
        let mut processors = Vec::new();
        for shard_index in 0..stream.shard_count() {
            let (tx, rx) = mpsc::channel(64);
            let handle =
                ShardReader::spawn(stream.clone(), store.clone(), shard_index, options(), tx);
            let processor = ShardProcessor::new(
                handle.shard_id().clone(),
                CountingHandler {
                    processed: processed.clone(),
                    metrics: metrics.clone(),
                },
            );
            processors.push(tokio::spawn(processor.run(rx)));
            readers.push(handle);
        }

        let report = LoadRunner::new(stream.clone(), producer_config(50, 2))
            .run()
            .await
            .unwrap();
        assert_eq!(report.target_total, 100);
        assert_eq!(report.attempted, 100);
        assert_eq!(report.completed, 100);
        assert_eq!(report.abandoned, 0);
        assert!(!report.aborted);

        stream.seal();

        let mut total_processed = 0;
        for processor in processors {
            let shard_report = tokio::time::timeout(Duration::from_secs(120), processor)
                .await
                .expect("shard did not drain")
                .unwrap();
            assert_eq!(shard_report.shutdown_reason, Some(ShutdownReason::ShardEnded));
            assert_eq!(shard_report.records_skipped, 0);
            assert!(shard_report.checkpoints_committed >= 1);
            total_processed += shard_report.records_processed;
        }
        assert_eq!(total_processed, 100);
        assert_eq!(processed.load(Ordering::SeqCst), 100);
        assert_eq!(stream.delivered_count(), 100);

        // Committed positions cover every record exactly once
        let mut committed = 0;
        for shard_id in stream.shard_ids() {
            committed += store.last_checkpoint(&shard_id).unwrap_or(0);
            assert!(store.write_count(&shard_id) >= 1);
        }
        assert_eq!(committed, 100);

        let summary = metrics.lock().unwrap().summary();
        assert_eq!(summary.total_records, 100);
        assert_eq!(summary.shard_record_counts.values().sum::<u64>(), 100);

        for reader in readers {
            reader.join().await;
        }
    }

    /// Graceful shutdown commits progress; the next worker resumes past it.
    #[tokio::test(start_paused = true)]
    async fn test_graceful_shutdown_checkpoints_and_resumes() {
        let stream = InMemoryStream::builder("bench-resume", 1).build();
        let store = InMemoryCheckpointStore::new("resume-app");
        let shard = ShardId::from_index(0);

        let processed = Arc::new(AtomicU64::new(0));
        let mut supervisor = ShardSupervisor::new(Duration::from_secs(20));
        let (tx, rx) = mpsc::channel(64);
        let handle = ShardReader::spawn(stream.clone(), store.clone(), 0, options(), tx);
        let processor = ShardProcessor::new(handle.shard_id().clone(), handler(&processed));
        supervisor.supervise(
            handle.shard_id().clone(),
            handle.shutdown_token(),
            processor.run(rx),
        );

        let report = LoadRunner::new(stream.clone(), producer_config(20, 2))
            .run()
            .await
            .unwrap();
        assert_eq!(report.completed, 40);
        wait_until(&processed, 40).await;

        let summary = supervisor.begin_graceful_shutdown().await;
        assert!(!summary.timed_out);
        assert_eq!(summary.records_processed(), 40);
        assert_eq!(
            summary.reports[0].shutdown_reason,
            Some(ShutdownReason::Requested)
        );
        assert!(summary.reports[0].checkpoints_committed >= 1);
        assert_eq!(store.last_checkpoint(&shard), Some(40));
        handle.join().await;

        // Same application, fresh worker: nothing left below the checkpoint
        let processed2 = Arc::new(AtomicU64::new(0));
        let (tx2, rx2) = mpsc::channel(64);
        let handle2 = ShardReader::spawn(stream.clone(), store.clone(), 0, options(), tx2);
        let processor2 = ShardProcessor::new(handle2.shard_id().clone(), handler(&processed2));
        let task2 = tokio::spawn(processor2.run(rx2));

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle2.request_shutdown();
        let report2 = task2.await.unwrap();
        assert_eq!(report2.records_seen, 0);
        assert_eq!(store.last_checkpoint(&shard), Some(40));
        handle2.join().await;
    }

    /// A stolen lease forbids checkpointing, so the next worker re-reads
    /// everything from the horizon.
    #[tokio::test(start_paused = true)]
    async fn test_lease_steal_reprocesses_uncommitted_records() {
        let stream = InMemoryStream::builder("bench-steal", 1).build();
        let shard = ShardId::from_index(0);

        let first_store = InMemoryCheckpointStore::new("steal-app");
        let processed = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel(64);
        let handle = ShardReader::spawn(stream.clone(), first_store.clone(), 0, options(), tx);
        let processor = ShardProcessor::new(handle.shard_id().clone(), handler(&processed));
        let task = tokio::spawn(processor.run(rx));

        let report = LoadRunner::new(stream.clone(), producer_config(10, 1))
            .run()
            .await
            .unwrap();
        assert_eq!(report.completed, 10);
        wait_until(&processed, 10).await;

        handle.steal_lease();
        let report = task.await.unwrap();
        assert_eq!(report.shutdown_reason, Some(ShutdownReason::LeaseLost));
        assert_eq!(report.checkpoints_committed, 0);
        assert_eq!(first_store.write_count(&shard), 0);
        assert_eq!(first_store.last_checkpoint(&shard), None);
        handle.join().await;

        // The thief holds its own lease row and finds no committed position
        stream.seal();
        let second_store = InMemoryCheckpointStore::new("steal-app");
        let processed2 = Arc::new(AtomicU64::new(0));
        let (tx2, rx2) = mpsc::channel(64);
        let handle2 = ShardReader::spawn(stream.clone(), second_store.clone(), 0, options(), tx2);
        let processor2 = ShardProcessor::new(handle2.shard_id().clone(), handler(&processed2));
        let report2 = tokio::time::timeout(Duration::from_secs(120), processor2.run(rx2))
            .await
            .expect("shard did not drain");
        assert_eq!(report2.records_processed, 10);
        assert_eq!(report2.shutdown_reason, Some(ShutdownReason::ShardEnded));
        assert_eq!(second_store.last_checkpoint(&shard), Some(10));
        handle2.join().await;
    }

    /// A terminal delivery failure fails the whole run.
    #[tokio::test(start_paused = true)]
    async fn test_terminal_put_failure_aborts_the_run() {
        let faults = StreamFaults {
            fail_puts: vec![3],
            error_code: String::new(),
        };
        let stream = InMemoryStream::builder("bench-fault", 1)
            .faults(faults)
            .build();

        let error = LoadRunner::new(stream.clone(), producer_config(10, 2))
            .run()
            .await
            .unwrap_err();
        assert!(
            error.to_string().contains("InternalFailure"),
            "unexpected error: {error}"
        );
    }

    /// LATEST attaches at the tip: the earlier window is invisible.
    #[tokio::test(start_paused = true)]
    async fn test_latest_consumer_only_sees_later_window() {
        let stream = InMemoryStream::builder("bench-latest", 1).build();
        let store = InMemoryCheckpointStore::new("latest-app");

        let first = LoadRunner::new(stream.clone(), producer_config(20, 1))
            .run()
            .await
            .unwrap();
        assert_eq!(first.completed, 20);

        let processed = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel(64);
        let opts = ReaderOptions {
            initial_position: InitialPosition::Latest,
            ..options()
        };
        let handle = ShardReader::spawn(stream.clone(), store.clone(), 0, opts, tx);
        let processor = ShardProcessor::new(handle.shard_id().clone(), handler(&processed));
        let task = tokio::spawn(processor.run(rx));

        let second = LoadRunner::new(stream.clone(), producer_config(20, 1))
            .run()
            .await
            .unwrap();
        assert_eq!(second.completed, 20);
        stream.seal();

        let report = tokio::time::timeout(Duration::from_secs(120), task)
            .await
            .expect("shard did not drain")
            .unwrap();
        assert_eq!(report.records_processed, 20);
        assert_eq!(report.shutdown_reason, Some(ShutdownReason::ShardEnded));
        handle.join().await;
    }
}
