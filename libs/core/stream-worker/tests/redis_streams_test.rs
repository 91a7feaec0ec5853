//! Redis Streams transport against a real Redis
//!
//! Each test starts its own container, so these need Docker:
//! `cargo test -p stream-worker --test redis_streams_test -- --ignored`

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_worker::redis_streams::{self, RedisRecordReader, RedisRecordWriter, RedisTopicAdmin, EVENT_FIELD};
use stream_worker::{
    CycleOutcome, ErrorCategory, EventProducer, ProducerConfig, RecordReader, RecordWriter, StreamError, StreamJob,
    StreamProcessor, StreamWorker, TopicAdmin, TopicSpec, WorkerConfig,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;
use tokio::sync::watch;

const TOPIC: &str = "receipts";
const GROUP: &str = "receipt-notifiers";

/// Redis container kept alive for the duration of a test.
struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    connection: ConnectionManager,
}

impl TestRedis {
    async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let connection = redis_streams::connect(&format!("redis://127.0.0.1:{host_port}"))
            .await
            .expect("Failed to connect to Redis");

        Self { container, connection }
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn provision(&self) {
        let admin = RedisTopicAdmin::new(self.connection(), GROUP);
        admin.create_topic(&TopicSpec::new(TOPIC, 1, 1)).await.unwrap();
    }

    async fn append(&self, payload: &[u8]) -> String {
        let mut conn = self.connection();
        redis::cmd("XADD")
            .arg(TOPIC)
            .arg("*")
            .arg(EVENT_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .unwrap()
    }

    /// Entry ids delivered to the group but not yet acknowledged.
    async fn pending(&self) -> Vec<String> {
        let mut conn = self.connection();
        let entries: Vec<(String, String, i64, i64)> = redis::cmd("XPENDING")
            .arg(TOPIC)
            .arg(GROUP)
            .arg("-")
            .arg("+")
            .arg(100)
            .query_async(&mut conn)
            .await
            .unwrap();
        entries.into_iter().map(|(id, ..)| id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Job {
    id: u32,
}

impl StreamJob for Job {
    fn job_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Default)]
struct RecordingProcessor {
    batches: Mutex<Vec<Vec<Job>>>,
}

impl RecordingProcessor {
    fn received(&self) -> Vec<Job> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl StreamProcessor<Job> for RecordingProcessor {
    async fn process(&self, batch: Vec<Job>) -> Result<(), StreamError> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn worker_config(consumer_id: &str) -> WorkerConfig {
    WorkerConfig::new(TOPIC, GROUP)
        .with_consumer_id(consumer_id)
        .with_fetch(1, Duration::from_millis(100))
}

fn worker(
    redis: &TestRedis,
    consumer_id: &str,
    processor: Arc<RecordingProcessor>,
) -> StreamWorker<Job, RecordingProcessor> {
    let config = worker_config(consumer_id);
    let reader = RedisRecordReader::new(redis.connection(), &config);
    StreamWorker::new(Box::new(reader), processor, config)
}

/// Run cycles until one forwards a batch. Draining the pending list costs a cycle.
async fn consume_until_forwarded(
    worker: &mut StreamWorker<Job, RecordingProcessor>,
    shutdown: &mut watch::Receiver<bool>,
) -> CycleOutcome {
    for _ in 0..5 {
        let outcome = worker.consume_once(shutdown).await.unwrap();
        if outcome != CycleOutcome::Empty {
            return outcome;
        }
    }
    panic!("no batch forwarded within 5 cycles");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_provisioning_twice_succeeds() {
    let redis = TestRedis::new().await;
    let admin = Arc::new(RedisTopicAdmin::new(redis.connection(), GROUP));
    let writer = Arc::new(RedisRecordWriter::new(redis.connection(), 1));
    let producer = EventProducer::new(admin.clone(), writer, ProducerConfig::new(TOPIC));

    producer.init_topic(1, 1).await.unwrap();
    producer.init_topic(1, 1).await.unwrap();

    // BUSYGROUP from the broker surfaces as "topic exists".
    let err = admin.create_topic(&TopicSpec::new(TOPIC, 1, 1)).await.unwrap_err();
    assert!(matches!(err, StreamError::TopicExists(ref name) if name == TOPIC));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_produced_events_are_consumed_and_acknowledged() {
    let redis = TestRedis::new().await;
    redis.provision().await;

    let admin = Arc::new(RedisTopicAdmin::new(redis.connection(), GROUP));
    let writer = Arc::new(RedisRecordWriter::new(redis.connection(), 1));
    let producer = EventProducer::new(admin, writer, ProducerConfig::new(TOPIC));
    producer.produce(&Job { id: 1 }, Duration::from_secs(2)).await.unwrap();
    producer.produce(&Job { id: 2 }, Duration::from_secs(2)).await.unwrap();

    let processor = Arc::new(RecordingProcessor::default());
    let mut worker = worker(&redis, "notifier-1", processor.clone());
    let (_tx, mut rx) = watch::channel(false);

    let outcome = consume_until_forwarded(&mut worker, &mut rx).await;
    assert_eq!(outcome, CycleOutcome::Forwarded { received: 2, decoded: 2 });
    assert_eq!(processor.received(), vec![Job { id: 1 }, Job { id: 2 }]);
    assert!(redis.pending().await.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_corrupt_entry_dropped_and_batch_acknowledged_once() {
    let redis = TestRedis::new().await;
    redis.provision().await;
    redis.append(br#"{"id":1}"#).await;
    redis.append(b"{not json").await;
    redis.append(br#"{"id":2}"#).await;

    let processor = Arc::new(RecordingProcessor::default());
    let mut worker = worker(&redis, "notifier-1", processor.clone());
    let (_tx, mut rx) = watch::channel(false);

    let outcome = consume_until_forwarded(&mut worker, &mut rx).await;
    assert_eq!(outcome, CycleOutcome::Forwarded { received: 3, decoded: 2 });
    assert_eq!(processor.received(), vec![Job { id: 1 }, Job { id: 2 }]);
    assert!(redis.pending().await.is_empty());

    // The corrupt entry is not handed out again.
    assert_eq!(worker.consume_once(&mut rx).await.unwrap(), CycleOutcome::Empty);
    assert_eq!(processor.received().len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_undecodable_pending_entry_does_not_stall_restarted_reader() {
    let redis = TestRedis::new().await;
    redis.provision().await;
    let garbage = redis.append(b"garbage").await;

    // A consumer reads the entry and stops before acknowledging it.
    let config = worker_config("notifier-1");
    let mut crashed = RedisRecordReader::new(redis.connection(), &config);
    let (_tx, mut rx) = watch::channel(false);
    // First poll drains the (empty) pending list, the second reads the new entry.
    crashed.poll(&mut rx).await.unwrap();
    let fetch = crashed.poll(&mut rx).await.unwrap();
    assert_eq!(fetch.records.len(), 1);
    drop(crashed);
    assert_eq!(redis.pending().await, vec![garbage.clone()]);

    redis.append(br#"{"id":7}"#).await;

    // The restarted consumer starts from its pending list.
    let processor = Arc::new(RecordingProcessor::default());
    let mut worker = worker(&redis, "notifier-1", processor.clone());

    let outcome = consume_until_forwarded(&mut worker, &mut rx).await;
    assert_eq!(outcome, CycleOutcome::Forwarded { received: 1, decoded: 1 });
    assert_eq!(processor.received(), vec![Job { id: 7 }]);

    // The skipped entry is acknowledged with the forwarded batch.
    assert!(redis.pending().await.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_replica_shortfall_is_transient() {
    let redis = TestRedis::new().await;
    redis.provision().await;

    // A standalone server has no replicas to acknowledge the write.
    let writer = RedisRecordWriter::new(redis.connection(), 2);
    let err = writer.write(TOPIC, br#"{"id":1}"#).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Transient);
    assert!(err.to_string().contains("0 of 1 replicas acknowledged"));
}
