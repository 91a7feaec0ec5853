//! Error types for mail delivery.

use std::time::Duration;
use stream_worker::{ErrorCategory, StreamError};
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The mail API throttled the request
    #[error("rate limited by mail API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The mail API refused the message; resending will not help
    #[error("mail API rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Server side or network failure
    #[error("mail API unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Unavailable(_) => ErrorCategory::Transient,
            Self::Rejected { .. } | Self::Serialization(_) | Self::InvalidInput(_) | Self::Config(_) => {
                ErrorCategory::Permanent
            }
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<NotificationError> for StreamError {
    fn from(err: NotificationError) -> Self {
        let category = err.category();
        StreamError::processing(err.to_string(), category)
    }
}
