//! Broker-agnostic event streaming.
//!
//! Producer and consumer sides of a topic, decoupled from the broker behind three
//! client seams ([`TopicAdmin`], [`RecordWriter`], [`RecordReader`]).
//!
//! ## Transports
//!
//! - [`memory`]: in-process log, used by tests and local runs
//! - [`redis_streams`]: Redis Streams with consumer groups
//! - `kafka`: Apache Kafka through `rdkafka` (cargo feature `kafka`)
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{EventProducer, StreamWorker, WorkerConfig};
//!
//! let producer = EventProducer::new(admin, writer, ProducerConfig::from_stream_def::<ReceiptStream>());
//! producer.init_topic(1, 1).await?;
//!
//! let config = WorkerConfig::from_stream_def::<ReceiptStream>();
//! let mut worker = StreamWorker::new(reader, Arc::new(processor), config);
//! worker.run(shutdown_rx).await?;
//! worker.close().await?;
//! ```

mod client;
mod config;
mod error;
mod health;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod metrics;
mod producer;
mod record;
pub mod redis_streams;
mod registry;
mod worker;

pub use client::{RecordReader, RecordWriter, TopicAdmin};
pub use config::{
    ProducerConfig, TopicSpec, WorkerConfig, DEFAULT_BATCH_MAX_BYTES, DEFAULT_FETCH_MAX_WAIT,
    DEFAULT_FETCH_MIN_BYTES, DEFAULT_PRODUCE_RETRIES,
};
pub use error::{ErrorCategory, StreamError};
pub use health::{health_router, HealthResponse, HealthState};
pub use memory::MemoryBroker;
pub use metrics::{init_metrics, Throughput};
pub use producer::EventProducer;
pub use record::{Fetch, PartitionError, Record};
pub use registry::{StreamDef, StreamJob, StreamProcessor};
pub use worker::{CycleOutcome, StreamWorker};
