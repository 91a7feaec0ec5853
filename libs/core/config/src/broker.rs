use crate::{env_list_or, env_or_default, env_parse_or, validate_host_port, ConfigError, FromEnv};
use std::time::Duration;
use strum::{Display, EnumString};

pub const DEFAULT_SEED_BROKERS: &[&str] = &["127.0.0.1:6379"];
pub const DEFAULT_TOPIC: &str = "receipts";
pub const DEFAULT_CONSUMER_GROUP: &str = "receipt-notifiers";
pub const MIN_PARTITIONS: i32 = 1;
pub const MIN_REPLICATION_FACTOR: i32 = 1;
pub const DEFAULT_PRODUCE_TIMEOUT: Duration = Duration::from_secs(3);

/// Which transport carries the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BrokerKind {
    /// In-process log, local runs only
    Memory,
    /// Redis Streams
    Redis,
    /// Apache Kafka (requires the `kafka` build feature)
    Kafka,
}

/// Broker connection and topic provisioning settings.
///
/// Environment variables:
/// - `RECEIPT_BROKER`: `memory`, `redis` or `kafka` (default: `redis`)
/// - `RECEIPT_SEED_BROKERS`: comma separated `host:port` or URLs
/// - `RECEIPT_TOPIC`, `RECEIPT_CONSUMER_GROUP`
/// - `RECEIPT_PARTITIONS`, `RECEIPT_REPLICATION_FACTOR`, `RECEIPT_MIN_INSYNC_REPLICAS`
/// - `RECEIPT_PRODUCE_TIMEOUT_MS`
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub seed_brokers: Vec<String>,
    pub topic: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub min_insync_replicas: i32,
    pub consumer_group: String,
    pub produce_timeout: Duration,
}

impl BrokerConfig {
    /// Default `min.insync.replicas`: one less than the replication factor, never below 1.
    pub fn default_min_insync(replication_factor: i32) -> i32 {
        (replication_factor - 1).max(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_brokers.is_empty() {
            return Err(invalid("RECEIPT_SEED_BROKERS", "at least one broker is required"));
        }
        for broker in &self.seed_brokers {
            if let Some((scheme, rest)) = broker.split_once("://") {
                if scheme.is_empty() || rest.is_empty() {
                    return Err(invalid("RECEIPT_SEED_BROKERS", &format!("{broker:?} is not a URL")));
                }
            } else {
                validate_host_port("RECEIPT_SEED_BROKERS", broker)?;
            }
        }
        if self.topic.trim().is_empty() {
            return Err(invalid("RECEIPT_TOPIC", "must not be empty"));
        }
        if self.consumer_group.trim().is_empty() {
            return Err(invalid("RECEIPT_CONSUMER_GROUP", "must not be empty"));
        }
        if self.partitions < MIN_PARTITIONS {
            return Err(invalid("RECEIPT_PARTITIONS", "must be at least 1"));
        }
        if self.replication_factor < MIN_REPLICATION_FACTOR {
            return Err(invalid("RECEIPT_REPLICATION_FACTOR", "must be at least 1"));
        }
        if !(1..=self.replication_factor).contains(&self.min_insync_replicas) {
            return Err(invalid(
                "RECEIPT_MIN_INSYNC_REPLICAS",
                "must be between 1 and the replication factor",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, details: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        details: details.to_string(),
    }
}

impl FromEnv for BrokerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let kind = env_parse_or("RECEIPT_BROKER", BrokerKind::Redis)?;
        let replication_factor = env_parse_or("RECEIPT_REPLICATION_FACTOR", MIN_REPLICATION_FACTOR)?;
        let timeout_ms = env_parse_or(
            "RECEIPT_PRODUCE_TIMEOUT_MS",
            DEFAULT_PRODUCE_TIMEOUT.as_millis() as u64,
        )?;

        let config = Self {
            kind,
            seed_brokers: env_list_or("RECEIPT_SEED_BROKERS", DEFAULT_SEED_BROKERS),
            topic: env_or_default("RECEIPT_TOPIC", DEFAULT_TOPIC),
            partitions: env_parse_or("RECEIPT_PARTITIONS", MIN_PARTITIONS)?,
            replication_factor,
            min_insync_replicas: env_parse_or(
                "RECEIPT_MIN_INSYNC_REPLICAS",
                Self::default_min_insync(replication_factor),
            )?,
            consumer_group: env_or_default("RECEIPT_CONSUMER_GROUP", DEFAULT_CONSUMER_GROUP),
            produce_timeout: Duration::from_millis(timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }
}
