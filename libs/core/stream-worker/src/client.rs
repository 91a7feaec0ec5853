//! Broker client seams.
//!
//! The producer and the worker own one client each, injected at construction, so
//! the memory transport can stand in for Redis or Kafka.

use crate::config::TopicSpec;
use crate::error::StreamError;
use crate::record::Fetch;
use async_trait::async_trait;
use tokio::sync::watch;

/// Topic provisioning.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Create the topic. Must return [`StreamError::TopicExists`] when the broker
    /// reports that it already exists.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), StreamError>;
}

/// Write side of a topic.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Write one record with no key, returning once every in-sync replica acknowledged it.
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), StreamError>;

    /// Flush and release the connection. Call only after in-flight writes drained.
    async fn close(&self) -> Result<(), StreamError>;
}

/// Read side of a topic under a consumer group.
#[async_trait]
pub trait RecordReader: Send {
    /// Wait for the next batch under the fetch policy. A shutdown observed while
    /// waiting yields [`StreamError::Cancelled`].
    async fn poll(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Fetch, StreamError>;

    /// Commit every record handed out by previous polls.
    async fn commit(&mut self) -> Result<(), StreamError>;

    /// Release the connection.
    async fn close(&mut self) -> Result<(), StreamError>;
}
