//! Redis Streams transport.
//!
//! A topic is one stream (a single partition). Provisioning creates the stream
//! together with the consumer group, acknowledgment from replicas is awaited with
//! `WAIT`, and offsets are committed with `XACK`.

use crate::client::{RecordReader, RecordWriter, TopicAdmin};
use crate::config::{TopicSpec, WorkerConfig};
use crate::error::StreamError;
use crate::record::{Fetch, PartitionError, Record};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Field holding the encoded event in each stream entry.
pub const EVENT_FIELD: &str = "event";

type StreamReply = Option<Vec<(String, Vec<(String, Vec<(String, Vec<u8>)>)>)>>;

/// Connect to Redis and verify the connection with PING.
pub async fn connect(url: &str) -> Result<ConnectionManager, StreamError> {
    info!(url = %url, "Connecting to Redis");

    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// Seed broker entries without a scheme are `host:port` pairs.
pub fn redis_url(seed: &str) -> String {
    if seed.contains("://") {
        seed.to_string()
    } else {
        format!("redis://{seed}")
    }
}

pub struct RedisTopicAdmin {
    redis: ConnectionManager,
    consumer_group: String,
}

impl RedisTopicAdmin {
    /// The group is created alongside the stream so consumption starts at the first entry.
    pub fn new(redis: ConnectionManager, consumer_group: impl Into<String>) -> Self {
        Self {
            redis,
            consumer_group: consumer_group.into(),
        }
    }
}

#[async_trait]
impl TopicAdmin for RedisTopicAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), StreamError> {
        if spec.partitions > 1 {
            warn!(
                topic = %spec.name,
                partitions = spec.partitions,
                "Redis streams have a single partition, ignoring partition count"
            );
        }

        let mut conn = self.redis.clone();
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&spec.name)
            .arg(&self.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(topic = %spec.name, group = %self.consumer_group, "Created stream and consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Err(StreamError::TopicExists(spec.name.clone())),
            Err(e) => Err(StreamError::Admin(e.to_string())),
        }
    }
}

pub struct RedisRecordWriter {
    redis: ConnectionManager,
    max_length: i64,
    /// Replicas besides the primary that must acknowledge each write
    replicas_to_wait: i32,
    replica_timeout: Duration,
}

impl RedisRecordWriter {
    pub fn new(redis: ConnectionManager, min_insync_replicas: i32) -> Self {
        Self {
            redis,
            max_length: 100_000,
            replicas_to_wait: (min_insync_replicas - 1).max(0),
            replica_timeout: Duration::from_secs(1),
        }
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }
}

#[async_trait]
impl RecordWriter for RedisRecordWriter {
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let stream_id: String = redis::cmd("XADD")
            .arg(topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(EVENT_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        if self.replicas_to_wait > 0 {
            let acked: i64 = redis::cmd("WAIT")
                .arg(self.replicas_to_wait)
                .arg(self.replica_timeout.as_millis() as u64)
                .query_async(&mut conn)
                .await?;
            if acked < i64::from(self.replicas_to_wait) {
                return Err(StreamError::transient(format!(
                    "entry {stream_id}: {acked} of {} replicas acknowledged",
                    self.replicas_to_wait
                )));
            }
        }

        debug!(topic = %topic, stream_id = %stream_id, "Appended event");
        Ok(())
    }

    async fn close(&self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Where the next `XREADGROUP` starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadFrom {
    /// Entries delivered to this consumer before a restart, after the given id
    Pending(String),
    /// Entries never delivered to any consumer of the group
    New,
}

impl ReadFrom {
    fn start() -> Self {
        Self::Pending("0".to_string())
    }

    fn id(&self) -> &str {
        match self {
            Self::Pending(id) => id,
            Self::New => ">",
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Move past the entries just handed out. Pending entries stay in the group's
    /// pending list until acknowledged, so re-reading from the same id would return
    /// them again.
    fn advance(&mut self, records: &[Record]) {
        if let Self::Pending(_) = self {
            *self = match records.last() {
                Some(last) => Self::Pending(last.id.clone()),
                None => Self::New,
            };
        }
    }
}

pub struct RedisRecordReader {
    redis: ConnectionManager,
    topic: String,
    consumer_group: String,
    consumer_id: String,
    count: usize,
    block: Duration,
    read_from: ReadFrom,
    /// Entries handed out since the last acknowledgment
    delivered: BTreeSet<String>,
}

impl RedisRecordReader {
    pub fn new(redis: ConnectionManager, config: &WorkerConfig) -> Self {
        Self {
            redis,
            topic: config.topic.clone(),
            consumer_group: config.consumer_group.clone(),
            consumer_id: config.consumer_id.clone(),
            count: config.max_poll_records,
            block: config.fetch_max_wait,
            read_from: ReadFrom::start(),
            delivered: BTreeSet::new(),
        }
    }

    fn to_records(&self, reply: StreamReply) -> Vec<Record> {
        let mut records = Vec::new();
        for (_stream, entries) in reply.unwrap_or_default() {
            for (stream_id, fields) in entries {
                let payload = fields
                    .into_iter()
                    .find(|(k, _)| k == EVENT_FIELD)
                    .map(|(_, v)| v)
                    .unwrap_or_default();
                records.push(Record::new(&self.topic, 0, stream_id, payload));
            }
        }
        records
    }
}

#[async_trait]
impl RecordReader for RedisRecordReader {
    async fn poll(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Fetch, StreamError> {
        if *shutdown.borrow() {
            return Err(StreamError::Cancelled("shutdown before poll".into()));
        }

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.consumer_group)
            .arg(&self.consumer_id)
            .arg("COUNT")
            .arg(self.count);
        if !self.read_from.is_pending() {
            cmd.arg("BLOCK").arg(self.block.as_millis() as u64);
        }
        cmd.arg("STREAMS").arg(&self.topic).arg(self.read_from.id());

        let mut conn = self.redis.clone();
        let result: RedisResult<StreamReply> = tokio::select! {
            result = cmd.query_async(&mut conn) => result,
            _ = shutdown.changed() => {
                return Err(StreamError::Cancelled("shutdown during poll".into()));
            }
        };

        match result {
            Ok(reply) => {
                let records = self.to_records(reply);
                if records.is_empty() && self.read_from.is_pending() {
                    debug!(topic = %self.topic, "No pending entries left, reading new ones");
                }
                self.read_from.advance(&records);
                self.delivered.extend(records.iter().map(|r| r.id.clone()));
                Ok(Fetch::new(records))
            }
            Err(e) if e.to_string().contains("NOGROUP") => Ok(Fetch {
                records: Vec::new(),
                errors: vec![PartitionError::new(&self.topic, 0, e.to_string())],
            }),
            Err(e) => Err(StreamError::Fetch(e.to_string())),
        }
    }

    async fn commit(&mut self) -> Result<(), StreamError> {
        if self.delivered.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let acked: i64 = redis::cmd("XACK")
            .arg(&self.topic)
            .arg(&self.consumer_group)
            .arg(self.delivered.iter().collect::<Vec<_>>())
            .query_async(&mut conn)
            .await
            .map_err(|e| StreamError::Commit(e.to_string()))?;

        debug!(topic = %self.topic, acked, "Acknowledged entries");
        self.delivered.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}
