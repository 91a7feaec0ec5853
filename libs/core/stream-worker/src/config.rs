//! Producer, consumer and topic configuration
//!
//! Defaults mirror the fetch and durability policy of the receipt pipeline:
//! 20 KiB minimum fetch, 2 s maximum wait, 3 bounded produce retries.

use crate::registry::StreamDef;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_FETCH_MIN_BYTES: usize = 20 * 1024;
pub const DEFAULT_FETCH_MAX_WAIT: Duration = Duration::from_secs(2);
pub const DEFAULT_PRODUCE_RETRIES: u32 = 3;
pub const DEFAULT_BATCH_MAX_BYTES: usize = 200 * 1024;

/// Topic provisioning parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub min_insync_replicas: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
            min_insync_replicas: (replication_factor - 1).max(1),
        }
    }

    pub fn with_min_insync_replicas(mut self, min_insync_replicas: i32) -> Self {
        self.min_insync_replicas = min_insync_replicas;
        self
    }
}

/// Configuration for the event producer
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Topic events are written to
    pub topic: String,

    /// Retries for transient write failures (attempts = retries + 1)
    pub max_retries: u32,

    /// `min.insync.replicas` requested at provisioning
    pub min_insync_replicas: i32,

    /// Upper bound for a client side batch
    pub batch_max_bytes: usize,
}

impl ProducerConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            max_retries: DEFAULT_PRODUCE_RETRIES,
            min_insync_replicas: 1,
            batch_max_bytes: DEFAULT_BATCH_MAX_BYTES,
        }
    }

    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self::new(S::TOPIC)
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_min_insync_replicas(mut self, replicas: i32) -> Self {
        self.min_insync_replicas = replicas;
        self
    }
}

/// Configuration for the stream worker (consumer side)
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Topic to consume
    pub topic: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Poll returns once this many bytes are buffered...
    pub fetch_min_bytes: usize,

    /// ...or once this much time has passed
    pub fetch_max_wait: Duration,

    /// Maximum records handed out per poll
    pub max_poll_records: usize,

    /// Throughput report period
    pub throughput_interval: Duration,

    /// Cap for the backoff applied after consecutive poll failures
    pub max_backoff: Duration,
}

impl WorkerConfig {
    /// Create a new WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self::new(S::TOPIC, S::CONSUMER_GROUP)
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(topic: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            fetch_min_bytes: DEFAULT_FETCH_MIN_BYTES,
            fetch_max_wait: DEFAULT_FETCH_MAX_WAIT,
            max_poll_records: 500,
            throughput_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the fetch policy
    pub fn with_fetch(mut self, min_bytes: usize, max_wait: Duration) -> Self {
        self.fetch_min_bytes = min_bytes;
        self.fetch_max_wait = max_wait;
        self
    }

    pub fn with_max_poll_records(mut self, count: usize) -> Self {
        self.max_poll_records = count.max(1);
        self
    }

    pub fn with_throughput_interval(mut self, interval: Duration) -> Self {
        self.throughput_interval = interval;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;

    impl StreamDef for TestStream {
        const TOPIC: &'static str = "test.events";
        const CONSUMER_GROUP: &'static str = "test-group";
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<TestStream>();

        assert_eq!(config.topic, "test.events");
        assert_eq!(config.consumer_group, "test-group");
        assert!(config.consumer_id.starts_with("worker-"));
        assert_eq!(config.fetch_min_bytes, 20 * 1024);
        assert_eq!(config.fetch_max_wait, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("a", "b")
            .with_consumer_id("worker-1")
            .with_fetch(1, Duration::from_millis(50))
            .with_max_poll_records(0);

        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.fetch_min_bytes, 1);
        assert_eq!(config.fetch_max_wait, Duration::from_millis(50));
        assert_eq!(config.max_poll_records, 1);
    }

    #[test]
    fn test_topic_spec_default_min_insync() {
        assert_eq!(TopicSpec::new("t", 1, 1).min_insync_replicas, 1);
        assert_eq!(TopicSpec::new("t", 3, 3).min_insync_replicas, 2);
        assert_eq!(TopicSpec::new("t", 3, 3).with_min_insync_replicas(3).min_insync_replicas, 3);
    }

    #[test]
    fn test_producer_config_defaults() {
        let config = ProducerConfig::from_stream_def::<TestStream>();
        assert_eq!(config.topic, "test.events");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_max_bytes, 200 * 1024);
    }
}
