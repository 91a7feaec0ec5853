//! Raw records and poll results as handed out by broker clients.

use std::fmt;

/// One raw record fetched from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    /// Transport position: `<offset>` for Kafka and memory, entry id for Redis
    pub id: String,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(topic: impl Into<String>, partition: i32, id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            id: id.into(),
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Partition level error surfaced by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionError {
    pub topic: String,
    pub partition: i32,
    pub error: String,
}

impl PartitionError {
    pub fn new(topic: impl Into<String>, partition: i32, error: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            error: error.into(),
        }
    }
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic {:?} partition {}: {}", self.topic, self.partition, self.error)
    }
}

/// Result of one poll: zero or more records plus partition errors.
#[derive(Debug, Clone, Default)]
pub struct Fetch {
    pub records: Vec<Record>,
    pub errors: Vec<PartitionError>,
}

impl Fetch {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            errors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.records.iter().map(Record::len).sum()
    }

    /// All partition errors joined into one message, `None` when there are none.
    pub fn joined_errors(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
