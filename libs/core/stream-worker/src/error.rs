//! Stream error types and error categorization
//!
//! Errors are categorized to determine retry behavior:
//! - **Transient**: Temporary failures, retry with exponential backoff
//! - **Permanent**: Unrecoverable errors, surfaced immediately
//! - **RateLimited**: Rate limit hit, longer backoff before retry

use std::time::Duration;
use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure - retry with exponential backoff
    Transient,
    /// Unrecoverable error - no retry
    Permanent,
    /// Rate limit hit - longer backoff
    RateLimited,
}

impl ErrorCategory {
    /// Get the maximum retries for this error category
    pub fn max_retries(&self) -> u32 {
        match self {
            ErrorCategory::Transient => 3,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 3,
        }
    }

    /// Get the base delay in milliseconds for this error category
    pub fn base_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 100,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 1000,
        }
    }

    /// Get the maximum delay in milliseconds for this error category
    pub fn max_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 2_000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 10_000,
        }
    }

    /// Calculate exponential backoff delay for given retry count
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        if *self == ErrorCategory::Permanent {
            return Duration::ZERO;
        }

        let delay = self.base_delay_ms() * 2u64.saturating_pow(retry_count);
        Duration::from_millis(delay.min(self.max_delay_ms()))
    }
}

/// Broker and pipeline errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Kafka client error
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Event could not be serialized or deserialized
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Topic provisioning hit an existing topic
    #[error("Topic '{0}' already exists")]
    TopicExists(String),

    /// Topic provisioning failed
    #[error("Broker admin error: {0}")]
    Admin(String),

    /// Transport level failure reported by a broker client
    #[error("Broker error: {message}")]
    Broker {
        message: String,
        category: ErrorCategory,
    },

    /// Produce failed after retries, or was cancelled; wraps the cause
    #[error("Produce error: {0}")]
    Produce(#[source] Box<StreamError>),

    /// Poll failed (partition errors are aggregated here)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Offset commit failed
    #[error("Commit error: {0}")]
    Commit(String),

    /// The operation was cancelled by a deadline or shutdown
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The sink failed to process a batch
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client already closed
    #[error("Broker client closed")]
    Closed,
}

impl StreamError {
    /// Create a transient broker error
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Broker {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent broker error
    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Broker {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Create a sink processing error
    pub fn processing(message: impl Into<String>, category: ErrorCategory) -> Self {
        StreamError::Processing {
            message: message.into(),
            category,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            #[cfg(feature = "kafka")]
            StreamError::Kafka(_) => ErrorCategory::Transient,
            StreamError::Broker { category, .. } => *category,
            StreamError::Processing { category, .. } => *category,
            StreamError::Produce(inner) => inner.category(),
            StreamError::Fetch(_) => ErrorCategory::Transient,
            StreamError::Commit(_) => ErrorCategory::Transient,
            StreamError::Encoding(_)
            | StreamError::TopicExists(_)
            | StreamError::Admin(_)
            | StreamError::Cancelled(_)
            | StreamError::Config(_)
            | StreamError::Closed => ErrorCategory::Permanent,
        }
    }

    /// Whether this error, or the error it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            StreamError::Cancelled(_) => true,
            StreamError::Produce(inner) => inner.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error should trigger a retry
    pub fn should_retry(&self, retry_count: u32) -> bool {
        let category = self.category();
        category != ErrorCategory::Permanent && retry_count < category.max_retries()
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ErrorCategory::Transient.max_retries(), 3);
        assert_eq!(ErrorCategory::Permanent.max_retries(), 0);
    }

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(ErrorCategory::Transient.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(ErrorCategory::Transient.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(ErrorCategory::Transient.backoff_delay(10), Duration::from_millis(2_000));
        assert_eq!(ErrorCategory::RateLimited.backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(ErrorCategory::Permanent.backoff_delay(3), Duration::ZERO);
    }

    #[test]
    fn test_should_retry() {
        let transient = StreamError::transient("leader not available");
        assert!(transient.should_retry(0));
        assert!(transient.should_retry(2));
        assert!(!transient.should_retry(3));

        let encoding = StreamError::Encoding("bad".into());
        assert!(!encoding.should_retry(0));
    }

    #[test]
    fn test_produce_wraps_cancellation() {
        let err = StreamError::Produce(Box::new(StreamError::Cancelled("deadline".into())));
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("Produce error"));
        assert!(!StreamError::Produce(Box::new(StreamError::transient("x"))).is_cancelled());
    }
}
