//! Kafka transport (feature `kafka`).
//!
//! Writes wait for all in-sync replicas (`acks=all`), consumers never auto-commit,
//! and provisioning maps `TopicAlreadyExists` to [`StreamError::TopicExists`].

use crate::client::{RecordReader, RecordWriter, TopicAdmin};
use crate::config::{ProducerConfig, TopicSpec, WorkerConfig};
use crate::error::StreamError;
use crate::record::{Fetch, PartitionError, Record};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

const ADMIN_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

fn base_config(seed_brokers: &[String]) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", seed_brokers.join(","));
    config
}

pub struct KafkaTopicAdmin {
    admin: AdminClient<DefaultClientContext>,
}

impl KafkaTopicAdmin {
    pub fn new(seed_brokers: &[String]) -> Result<Self, StreamError> {
        let admin = base_config(seed_brokers).create()?;
        Ok(Self { admin })
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), StreamError> {
        let min_insync = spec.min_insync_replicas.to_string();
        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        )
        .set("min.insync.replicas", &min_insync);
        let options = AdminOptions::new().operation_timeout(Some(Timeout::After(ADMIN_TIMEOUT)));

        let results = self
            .admin
            .create_topics(&[topic], &options)
            .await
            .map_err(|e| StreamError::Admin(e.to_string()))?;

        for result in results {
            match result {
                Ok(name) => info!(topic = %name, "Created topic"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Err(StreamError::TopicExists(name));
                }
                Err((name, code)) => {
                    return Err(StreamError::Admin(format!("topic {name:?}: {code}")));
                }
            }
        }
        Ok(())
    }
}

pub struct KafkaRecordWriter {
    producer: FutureProducer,
}

impl KafkaRecordWriter {
    pub fn new(seed_brokers: &[String], config: &ProducerConfig) -> Result<Self, StreamError> {
        let producer = base_config(seed_brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("batch.size", config.batch_max_bytes.to_string())
            .create()?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl RecordWriter for KafkaRecordWriter {
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), StreamError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);
        self.producer
            .send(record, Timeout::Never)
            .await
            .map(|_| ())
            .map_err(|(e, _)| StreamError::Kafka(e))
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.producer.flush(Timeout::After(FLUSH_TIMEOUT))?;
        Ok(())
    }
}

pub struct KafkaRecordReader {
    consumer: StreamConsumer,
    topic: String,
    min_bytes: usize,
    max_wait: Duration,
    max_records: usize,
    uncommitted: bool,
}

impl KafkaRecordReader {
    pub fn new(seed_brokers: &[String], config: &WorkerConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = base_config(seed_brokers)
            .set("group.id", &config.consumer_group)
            .set("client.id", &config.consumer_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", config.fetch_min_bytes.to_string())
            .set("fetch.wait.max.ms", config.fetch_max_wait.as_millis().to_string())
            .create()?;
        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            min_bytes: config.fetch_min_bytes,
            max_wait: config.fetch_max_wait,
            max_records: config.max_poll_records,
            uncommitted: false,
        })
    }
}

#[async_trait]
impl RecordReader for KafkaRecordReader {
    async fn poll(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Fetch, StreamError> {
        if *shutdown.borrow() {
            return Err(StreamError::Cancelled("shutdown before poll".into()));
        }

        let deadline = Instant::now() + self.max_wait;
        let mut fetch = Fetch::default();
        let mut bytes = 0;

        while fetch.records.len() < self.max_records && bytes < self.min_bytes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            tokio::select! {
                received = tokio::time::timeout(remaining, self.consumer.recv()) => match received {
                    Err(_) => break,
                    Ok(Ok(message)) => {
                        let payload = message.payload().map(<[u8]>::to_vec).unwrap_or_default();
                        bytes += payload.len();
                        fetch.records.push(Record::new(
                            message.topic(),
                            message.partition(),
                            message.offset().to_string(),
                            payload,
                        ));
                    }
                    Ok(Err(e)) => {
                        fetch.errors.push(PartitionError::new(&self.topic, -1, e.to_string()));
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    return Err(StreamError::Cancelled("shutdown during poll".into()));
                }
            }
        }

        if !fetch.records.is_empty() {
            self.uncommitted = true;
        }
        debug!(topic = %self.topic, records = fetch.records.len(), bytes, "Kafka poll");
        Ok(fetch)
    }

    async fn commit(&mut self) -> Result<(), StreamError> {
        if !self.uncommitted {
            return Ok(());
        }
        let consumer = &self.consumer;
        tokio::task::block_in_place(|| consumer.commit_consumer_state(CommitMode::Sync))
            .map_err(|e| StreamError::Commit(e.to_string()))?;
        self.uncommitted = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.consumer.unsubscribe();
        Ok(())
    }
}
