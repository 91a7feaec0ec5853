//! Stream definitions, job payloads and the processing sink capability.

use crate::error::StreamError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Stream definition trait.
///
/// Each domain implements this trait to name its topic and consumer group.
///
/// ```rust,ignore
/// pub struct ReceiptStream;
///
/// impl StreamDef for ReceiptStream {
///     const TOPIC: &'static str = "receipts";
///     const CONSUMER_GROUP: &'static str = "receipt-notifiers";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The topic name.
    const TOPIC: &'static str;

    /// The consumer group name for this topic.
    const CONSUMER_GROUP: &'static str;

    /// Maximum stream length before auto-trim (Redis MAXLEN).
    const MAX_LENGTH: i64 = 100_000;
}

/// Trait for event payloads carried on a topic.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the job ID for logging and tracking.
    fn job_id(&self) -> String;
}

/// Sink that receives decoded batches from the worker.
///
/// Implementations must bound their own work: the worker applies no timeout
/// around `process`, so a hanging sink stalls consumption.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    /// Process one decoded batch.
    async fn process(&self, batch: Vec<J>) -> Result<(), StreamError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;

    /// Health check for the processor.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;
    impl StreamDef for TestStream {
        const TOPIC: &'static str = "test.stream";
        const CONSUMER_GROUP: &'static str = "test_workers";
    }

    #[test]
    fn test_stream_def() {
        assert_eq!(TestStream::TOPIC, "test.stream");
        assert_eq!(TestStream::CONSUMER_GROUP, "test_workers");
        assert_eq!(TestStream::MAX_LENGTH, 100_000);
    }
}
