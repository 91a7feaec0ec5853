use stream_worker::StreamDef;

/// The receipts topic and the group of notifier consumers.
pub struct ReceiptStream;

impl StreamDef for ReceiptStream {
    const TOPIC: &'static str = "receipts";
    const CONSUMER_GROUP: &'static str = "receipt-notifiers";
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_worker::{ProducerConfig, WorkerConfig};

    #[test]
    fn test_configs_from_receipt_stream() {
        let worker = WorkerConfig::from_stream_def::<ReceiptStream>();
        assert_eq!(worker.topic, "receipts");
        assert_eq!(worker.consumer_group, "receipt-notifiers");
        assert_eq!(ProducerConfig::from_stream_def::<ReceiptStream>().topic, worker.topic);
    }
}
