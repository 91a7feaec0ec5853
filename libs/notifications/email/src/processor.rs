//! ReceiptNotifier - mails each decoded receipt to its customer
//!
//! Implements `stream_worker::StreamProcessor<Receipt>`, so it plugs into the
//! consumer loop as the batch sink.

use crate::error::NotificationError;
use crate::models::Email;
use crate::provider::EmailProvider;
use async_trait::async_trait;
use domain_receipts::Receipt;
use domain_receipts::template::render_text;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use stream_worker::{ErrorCategory, StreamError, StreamProcessor};
use tracing::{debug, info, warn};

/// Email subject for a receipt
pub fn receipt_subject(receipt: &Receipt) -> String {
    format!("Кассовый чек № {}", receipt.number)
}

/// `P` may be `dyn EmailProvider` when the provider is chosen at runtime.
pub struct ReceiptNotifier<P: EmailProvider + ?Sized> {
    provider: Arc<P>,
    from_email: String,
    concurrency: usize,
}

impl<P: EmailProvider + ?Sized> ReceiptNotifier<P> {
    pub fn new(provider: Arc<P>, from_email: impl Into<String>) -> Self {
        Self {
            provider,
            from_email: from_email.into(),
            concurrency: crate::config::DEFAULT_MAIL_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn render_email(&self, receipt: &Receipt) -> Email {
        Email::new(&receipt.customer_email, receipt_subject(receipt))
            .with_from(&self.from_email)
            .with_text(render_text(receipt))
    }

    async fn notify(&self, receipt: &Receipt) -> Result<(), NotificationError> {
        let email = self.render_email(receipt);
        let sent = self.provider.send(&email).await?;
        debug!(
            receipt_id = %receipt.id,
            message_id = %sent.message_id,
            provider = self.provider.name(),
            "Receipt mailed"
        );
        Ok(())
    }
}

/// Retryable categories win, so a mixed batch is reported as worth retrying.
fn batch_category(failures: &[(String, NotificationError)]) -> ErrorCategory {
    let categories: Vec<ErrorCategory> = failures.iter().map(|(_, e)| e.category()).collect();
    if categories.contains(&ErrorCategory::RateLimited) {
        ErrorCategory::RateLimited
    } else if categories.contains(&ErrorCategory::Transient) {
        ErrorCategory::Transient
    } else {
        ErrorCategory::Permanent
    }
}

#[async_trait]
impl<P: EmailProvider + ?Sized + 'static> StreamProcessor<Receipt> for ReceiptNotifier<P> {
    async fn process(&self, batch: Vec<Receipt>) -> Result<(), StreamError> {
        let total = batch.len();
        let deliverable: Vec<Receipt> = batch
            .into_iter()
            .filter(|receipt| {
                if receipt.customer_email.trim().is_empty() {
                    warn!(receipt_id = %receipt.id, number = receipt.number, "Receipt has no customer email, skipping");
                    return false;
                }
                true
            })
            .collect();
        let attempted = deliverable.len();

        let failures: Vec<(String, NotificationError)> = stream::iter(
            deliverable
                .iter()
                .map(|receipt| async move { self.notify(receipt).await.map_err(|e| (receipt.id.to_string(), e)) })
                .collect::<Vec<_>>(),
        )
        .buffer_unordered(self.concurrency)
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        if failures.is_empty() {
            info!(total, sent = attempted, "Receipt batch mailed");
            return Ok(());
        }

        for (receipt_id, error) in &failures {
            warn!(receipt_id = %receipt_id, error = %error, "Failed to mail receipt");
        }
        let message = failures
            .iter()
            .map(|(receipt_id, error)| format!("receipt {receipt_id}: {error}"))
            .collect::<Vec<_>>()
            .join("; ");

        Err(StreamError::processing(
            format!("{} of {attempted} receipts not mailed: {message}", failures.len()),
            batch_category(&failures),
        ))
    }

    fn name(&self) -> &'static str {
        "receipt_notifier"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.provider.health_check().await?;
        Ok(true)
    }
}
