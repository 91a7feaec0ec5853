//! HTTP mail API provider
//!
//! Posts `{sender, to, subject, textContent}` as JSON. Throttled requests are
//! retried after the server's `Retry-After`, a bounded number of times.

use crate::config::MailConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::Email;
use crate::provider::{EmailProvider, SendResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email: String,
}

/// Mail API request payload
#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub sender: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    #[serde(rename = "textContent")]
    pub text_content: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    #[serde(rename = "messageId")]
    message_id: String,
}

pub struct HttpMailProvider {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from_email: String,
    max_retries: u32,
}

impl HttpMailProvider {
    pub fn new(api_url: impl Into<String>, from_email: impl Into<String>, timeout: Duration) -> NotificationResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: None,
            from_email: from_email.into(),
            max_retries: MAX_RATE_LIMIT_RETRIES,
        })
    }

    pub fn from_config(config: &MailConfig) -> NotificationResult<Self> {
        let provider = Self::new(&config.api_url, &config.from, config.timeout)?;
        Ok(match &config.api_key {
            Some(key) => provider.with_api_key(key),
            None => provider,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    fn request_body(&self, email: &Email) -> SendEmailRequest {
        SendEmailRequest {
            sender: EmailAddress {
                email: email.from.clone().unwrap_or_else(|| self.from_email.clone()),
            },
            to: vec![EmailAddress {
                email: email.to.clone(),
            }],
            subject: email.subject.clone(),
            text_content: email.body_text.clone(),
        }
    }

    async fn send_once(&self, email: &Email, body: &SendEmailRequest) -> NotificationResult<SendResult> {
        let mut request = self.client.post(&self.api_url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let message_id = response
                .json::<MessageCreated>()
                .await
                .map(|created| created.message_id)
                .unwrap_or_else(|_| email.id.clone());
            return Ok(SendResult { message_id });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(NotificationError::RateLimited { retry_after });
        }

        let message = response.text().await.unwrap_or_default().trim().to_string();
        error!(status = %status, error = %message, to = %email.to, "Mail API error");

        if status.is_client_error() {
            Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(NotificationError::Unavailable(format!("{status}: {message}")))
        }
    }
}

#[async_trait]
impl EmailProvider for HttpMailProvider {
    async fn send(&self, email: &Email) -> NotificationResult<SendResult> {
        let body = self.request_body(email);
        let mut attempt = 0;

        loop {
            debug!(to = %email.to, subject = %email.subject, attempt, "Sending email via mail API");
            match self.send_once(email, &body).await {
                Err(NotificationError::RateLimited { retry_after }) if attempt < self.max_retries => {
                    let delay = retry_after.unwrap_or(DEFAULT_RETRY_AFTER).min(MAX_RETRY_AFTER);
                    warn!(to = %email.to, attempt, delay_ms = delay.as_millis() as u64, "Rate limited by mail API");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn health_check(&self) -> NotificationResult<()> {
        if self.api_url.is_empty() {
            return Err(NotificationError::Config("mail API URL not configured".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let provider = HttpMailProvider::new("http://localhost/v1/email", "receipts@example.com", Duration::from_secs(1)).unwrap();
        let email = Email::new("user@example.com", "Кассовый чек № 1").with_text("text");

        let json = serde_json::to_value(provider.request_body(&email)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sender": {"email": "receipts@example.com"},
                "to": [{"email": "user@example.com"}],
                "subject": "Кассовый чек № 1",
                "textContent": "text"
            })
        );
    }
}
