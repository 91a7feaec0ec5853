//! Broker client factory.
//!
//! Builds the admin, writer and reader seams for the configured transport.

use core_config::broker::{BrokerConfig, BrokerKind};
use domain_receipts::ReceiptStream;
use std::sync::Arc;
use stream_worker::redis_streams::{self, RedisRecordReader, RedisRecordWriter, RedisTopicAdmin};
use stream_worker::{
    MemoryBroker, ProducerConfig, RecordReader, RecordWriter, StreamDef, StreamError, TopicAdmin, WorkerConfig,
};
use tracing::{info, warn};

pub struct BrokerClients {
    pub admin: Arc<dyn TopicAdmin>,
    pub writer: Arc<dyn RecordWriter>,
    pub reader: Box<dyn RecordReader>,
}

pub async fn connect(
    config: &BrokerConfig,
    producer: &ProducerConfig,
    worker: &WorkerConfig,
) -> Result<BrokerClients, StreamError> {
    info!(kind = %config.kind, seeds = ?config.seed_brokers, "Connecting to broker");

    match config.kind {
        BrokerKind::Memory => {
            warn!("Using the in-memory broker; receipts are lost on restart");
            let broker = MemoryBroker::new();
            Ok(BrokerClients {
                admin: Arc::new(broker.admin()),
                writer: Arc::new(broker.writer()),
                reader: Box::new(broker.reader(worker)),
            })
        }
        BrokerKind::Redis => connect_redis(config, worker).await,
        BrokerKind::Kafka => connect_kafka(config, producer, worker),
    }
}

async fn connect_redis(config: &BrokerConfig, worker: &WorkerConfig) -> Result<BrokerClients, StreamError> {
    let seed = config
        .seed_brokers
        .first()
        .ok_or_else(|| StreamError::Config("no seed broker configured".into()))?;
    let url = redis_streams::redis_url(seed);

    // XREADGROUP BLOCK would stall writes sharing its connection.
    let producer_conn = redis_streams::connect(&url).await?;
    let consumer_conn = redis_streams::connect(&url).await?;

    Ok(BrokerClients {
        admin: Arc::new(RedisTopicAdmin::new(producer_conn.clone(), &config.consumer_group)),
        writer: Arc::new(
            RedisRecordWriter::new(producer_conn, config.min_insync_replicas).with_max_length(ReceiptStream::MAX_LENGTH),
        ),
        reader: Box::new(RedisRecordReader::new(consumer_conn, worker)),
    })
}

#[cfg(feature = "kafka")]
fn connect_kafka(
    config: &BrokerConfig,
    producer: &ProducerConfig,
    worker: &WorkerConfig,
) -> Result<BrokerClients, StreamError> {
    use stream_worker::kafka::{KafkaRecordReader, KafkaRecordWriter, KafkaTopicAdmin};

    Ok(BrokerClients {
        admin: Arc::new(KafkaTopicAdmin::new(&config.seed_brokers)?),
        writer: Arc::new(KafkaRecordWriter::new(&config.seed_brokers, producer)?),
        reader: Box::new(KafkaRecordReader::new(&config.seed_brokers, worker)?),
    })
}

#[cfg(not(feature = "kafka"))]
fn connect_kafka(
    _config: &BrokerConfig,
    _producer: &ProducerConfig,
    _worker: &WorkerConfig,
) -> Result<BrokerClients, StreamError> {
    Err(StreamError::Config(
        "RECEIPT_BROKER=kafka requires a build with the `kafka` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn broker_config(kind: BrokerKind) -> BrokerConfig {
        BrokerConfig {
            kind,
            seed_brokers: vec!["127.0.0.1:6379".into()],
            topic: "receipts".into(),
            partitions: 1,
            replication_factor: 1,
            min_insync_replicas: 1,
            consumer_group: "receipt-notifiers".into(),
            produce_timeout: Duration::from_secs(3),
        }
    }

    #[tokio::test]
    async fn test_memory_clients_share_one_log() {
        let config = broker_config(BrokerKind::Memory);
        let producer = ProducerConfig::new("receipts");
        let worker = WorkerConfig::new("receipts", "receipt-notifiers").with_fetch(1, Duration::from_millis(100));

        let mut clients = connect(&config, &producer, &worker).await.unwrap();
        clients
            .admin
            .create_topic(&stream_worker::TopicSpec::new("receipts", 1, 1))
            .await
            .unwrap();
        clients.writer.write("receipts", br#"{"number":1}"#).await.unwrap();

        let (_tx, mut rx) = tokio::sync::watch::channel(false);
        let fetch = clients.reader.poll(&mut rx).await.unwrap();
        assert_eq!(fetch.records.len(), 1);
        assert_eq!(fetch.records[0].topic, "receipts");
        assert_eq!(fetch.records[0].payload, br#"{"number":1}"#.to_vec());
    }

    #[cfg(not(feature = "kafka"))]
    #[tokio::test]
    async fn test_kafka_without_feature_is_config_error() {
        let config = broker_config(BrokerKind::Kafka);
        let producer = ProducerConfig::new("receipts");
        let worker = WorkerConfig::new("receipts", "receipt-notifiers");

        let err = connect(&config, &producer, &worker).await.err().unwrap();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
