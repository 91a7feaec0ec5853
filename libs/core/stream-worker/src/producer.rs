//! Event producer.
//!
//! Owns the topic admin and the record writer of one broker. Provisioning is
//! idempotent, and every produce runs its bounded retries inside a single deadline.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_worker::{EventProducer, MemoryBroker, ProducerConfig};
//!
//! let broker = MemoryBroker::new();
//! let producer = EventProducer::new(
//!     Arc::new(broker.admin()),
//!     Arc::new(broker.writer()),
//!     ProducerConfig::new("receipts"),
//! );
//! producer.init_topic(1, 1).await?;
//! producer.produce(&receipt, Duration::from_secs(3)).await?;
//! ```

use crate::client::{RecordWriter, TopicAdmin};
use crate::config::{ProducerConfig, TopicSpec};
use crate::error::StreamError;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct EventProducer {
    admin: Arc<dyn TopicAdmin>,
    writer: Arc<dyn RecordWriter>,
    config: ProducerConfig,
}

impl EventProducer {
    pub fn new(admin: Arc<dyn TopicAdmin>, writer: Arc<dyn RecordWriter>, config: ProducerConfig) -> Self {
        Self { admin, writer, config }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Create the topic. A topic that already exists counts as success.
    pub async fn init_topic(&self, partitions: i32, replication_factor: i32) -> Result<(), StreamError> {
        let spec = TopicSpec::new(&self.config.topic, partitions, replication_factor)
            .with_min_insync_replicas(self.config.min_insync_replicas);

        match self.admin.create_topic(&spec).await {
            Ok(()) => {
                info!(
                    topic = %spec.name,
                    partitions,
                    replication_factor,
                    min_insync_replicas = spec.min_insync_replicas,
                    "Topic created"
                );
                Ok(())
            }
            Err(StreamError::TopicExists(name)) => {
                info!(topic = %name, "Topic already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Encode `event` as JSON and write it, giving up once `deadline` elapses.
    ///
    /// Encoding failures are returned as is. Write failures and deadline expiry are
    /// wrapped in [`StreamError::Produce`]; expiry wraps [`StreamError::Cancelled`].
    pub async fn produce<E: Serialize + ?Sized>(&self, event: &E, deadline: Duration) -> Result<(), StreamError> {
        let payload = serde_json::to_vec(event)?;

        let result = match tokio::time::timeout(deadline, self.write_with_retry(&payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(StreamError::Produce(Box::new(e))),
            Err(_) => Err(StreamError::Produce(Box::new(StreamError::Cancelled(format!(
                "produce deadline of {deadline:?} exceeded"
            ))))),
        };

        let status = match &result {
            Ok(()) => "success",
            Err(e) if e.is_cancelled() => "cancelled",
            Err(_) => "failed",
        };
        counter!("receipt_events_produced_total", "topic" => self.config.topic.clone(), "status" => status)
            .increment(1);

        result
    }

    async fn write_with_retry(&self, payload: &[u8]) -> Result<(), StreamError> {
        let mut attempt: u32 = 0;
        loop {
            match self.writer.write(&self.config.topic, payload).await {
                Ok(()) => {
                    debug!(topic = %self.config.topic, bytes = payload.len(), attempt, "Event written");
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_retries && e.should_retry(attempt) => {
                    let delay = e.category().backoff_delay(attempt);
                    warn!(
                        topic = %self.config.topic,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Flush and release the writer. In-flight produces must have finished.
    pub async fn close(&self) -> Result<(), StreamError> {
        self.writer.close().await?;
        info!(topic = %self.config.topic, "Producer closed");
        Ok(())
    }
}
