use std::time::Duration;
use stream_worker::EventProducer;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ReceiptError, ReceiptResult};
use crate::models::Receipt;
use crate::wire::ReceiptRequest;

/// Intake side: turns requests into receipts and hands them to the producer.
pub struct ReceiptService {
    producer: EventProducer,
    produce_timeout: Duration,
}

impl ReceiptService {
    pub fn new(producer: EventProducer, produce_timeout: Duration) -> Self {
        Self {
            producer,
            produce_timeout,
        }
    }

    pub fn producer(&self) -> &EventProducer {
        &self.producer
    }

    /// Validate, map to a domain receipt and produce it. Returns the receipt id.
    pub async fn accept(&self, request: ReceiptRequest) -> ReceiptResult<Uuid> {
        request
            .validate()
            .map_err(|e| ReceiptError::Validation(e.to_string()))?;

        let receipt = Receipt::from(request);
        self.save_event(&receipt).await?;
        Ok(receipt.id)
    }

    /// Produce the receipt within the configured deadline.
    pub async fn save_event(&self, receipt: &Receipt) -> ReceiptResult<()> {
        match self.producer.produce(receipt, self.produce_timeout).await {
            Ok(()) => {
                info!(receipt_id = %receipt.id, number = receipt.number, topic = %self.producer.topic(), "Receipt enqueued");
                Ok(())
            }
            Err(e) => {
                error!(receipt_id = %receipt.id, error = %e, cancelled = e.is_cancelled(), "Failed to enqueue receipt");
                Err(ReceiptError::Unavailable(e))
            }
        }
    }
}
