//! Mock email provider that records mail instead of sending it

use super::{EmailProvider, SendResult};
use crate::error::{NotificationError, NotificationResult};
use crate::models::Email;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Captures sent emails. Used by tests and by `RECEIPT_MAIL_PROVIDER=mock`.
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    sent_emails: Arc<Mutex<Vec<Email>>>,
    failure_message: Option<String>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider that always fails with a transient error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            failure_message: Some(message.into()),
        }
    }

    pub async fn sent_emails(&self) -> Vec<Email> {
        self.sent_emails.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent_emails.lock().await.iter().any(|e| e.to == address)
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &Email) -> NotificationResult<SendResult> {
        if let Some(message) = &self.failure_message {
            return Err(NotificationError::Unavailable(message.clone()));
        }

        debug!(to = %email.to, subject = %email.subject, "Captured email");
        self.sent_emails.lock().await.push(email.clone());

        Ok(SendResult {
            message_id: format!("mock-{}", email.id),
        })
    }

    async fn health_check(&self) -> NotificationResult<()> {
        if self.failure_message.is_some() {
            return Err(NotificationError::Unavailable("mock health check failed".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_captures_email() {
        let provider = MockEmailProvider::new();
        let email = Email::new("user@example.com", "Кассовый чек № 1").with_text("body");

        let result = provider.send(&email).await.unwrap();
        assert_eq!(result.message_id, format!("mock-{}", email.id));
        assert!(provider.was_sent_to("user@example.com").await);
        assert!(!provider.was_sent_to("other@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockEmailProvider::failing("Simulated failure");
        let email = Email::new("user@example.com", "Test");

        let err = provider.send(&email).await.unwrap_err();
        assert!(err.to_string().contains("Simulated failure"));
        assert_eq!(provider.sent_count().await, 0);
        assert!(provider.health_check().await.is_err());
    }
}
