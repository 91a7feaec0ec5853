//! In-process broker.
//!
//! A partitioned append-only log with per-group committed offsets. Used by tests
//! and by local runs without a broker. Fault injection hooks let tests drive the
//! failure paths of the producer and the worker.

use crate::client::{RecordReader, RecordWriter, TopicAdmin};
use crate::config::{TopicSpec, WorkerConfig};
use crate::error::StreamError;
use crate::record::{Fetch, PartitionError, Record};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::debug;

#[derive(Default)]
struct Faults {
    failing_writes: u32,
    write_delay: Option<Duration>,
    fetch_errors: Vec<PartitionError>,
    failing_commits: u32,
}

struct MemoryTopic {
    spec: TopicSpec,
    partitions: Vec<Vec<Vec<u8>>>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, MemoryTopic>,
    /// (group, topic, partition) -> next offset to deliver
    committed: HashMap<(String, String, i32), usize>,
    faults: Faults,
    commits: usize,
    next_partition: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    appended: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-update; the log itself is intact.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to an in-process broker. Clones share the same log.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admin(&self) -> MemoryAdmin {
        MemoryAdmin {
            shared: self.shared.clone(),
        }
    }

    pub fn writer(&self) -> MemoryWriter {
        MemoryWriter {
            shared: self.shared.clone(),
        }
    }

    pub fn reader(&self, config: &WorkerConfig) -> MemoryReader {
        MemoryReader {
            shared: self.shared.clone(),
            topic: config.topic.clone(),
            group: config.consumer_group.clone(),
            positions: HashMap::new(),
            min_bytes: config.fetch_min_bytes,
            max_wait: config.fetch_max_wait,
            max_records: config.max_poll_records,
            closed: false,
        }
    }

    /// Append a raw payload to a partition, bypassing the writer.
    pub fn append_raw(&self, topic: &str, partition: i32, payload: Vec<u8>) -> Result<(), StreamError> {
        {
            let mut state = self.shared.lock();
            let log = state
                .topics
                .get_mut(topic)
                .ok_or_else(|| StreamError::permanent(format!("unknown topic {topic:?}")))?;
            let slot = log
                .partitions
                .get_mut(partition as usize)
                .ok_or_else(|| StreamError::permanent(format!("unknown partition {partition}")))?;
            slot.push(payload);
        }
        self.shared.appended.notify_waiters();
        Ok(())
    }

    /// Every payload of a topic, partition by partition.
    pub fn records(&self, topic: &str) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn topic_spec(&self, topic: &str) -> Option<TopicSpec> {
        self.shared.lock().topics.get(topic).map(|t| t.spec.clone())
    }

    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<usize> {
        self.shared
            .lock()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Number of successful commits across all readers.
    pub fn commit_count(&self) -> usize {
        self.shared.lock().commits
    }

    /// The next `n` writes fail with a transient error.
    pub fn fail_next_writes(&self, n: u32) {
        self.shared.lock().faults.failing_writes = n;
    }

    /// Every write sleeps before being acknowledged.
    pub fn delay_writes(&self, delay: Duration) {
        self.shared.lock().faults.write_delay = Some(delay);
    }

    /// The next poll reports this partition error.
    pub fn inject_fetch_error(&self, error: PartitionError) {
        self.shared.lock().faults.fetch_errors.push(error);
        self.shared.appended.notify_waiters();
    }

    /// The next `n` commits fail.
    pub fn fail_next_commits(&self, n: u32) {
        self.shared.lock().faults.failing_commits = n;
    }
}

pub struct MemoryAdmin {
    shared: Arc<Shared>,
}

#[async_trait]
impl TopicAdmin for MemoryAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), StreamError> {
        let mut state = self.shared.lock();
        if state.topics.contains_key(&spec.name) {
            return Err(StreamError::TopicExists(spec.name.clone()));
        }
        if spec.partitions < 1 {
            return Err(StreamError::Admin(format!(
                "invalid partition count {} for topic {:?}",
                spec.partitions, spec.name
            )));
        }
        if !(1..=spec.replication_factor).contains(&spec.min_insync_replicas) {
            return Err(StreamError::Admin(format!(
                "min.insync.replicas {} exceeds replication factor {}",
                spec.min_insync_replicas, spec.replication_factor
            )));
        }

        state.topics.insert(
            spec.name.clone(),
            MemoryTopic {
                spec: spec.clone(),
                partitions: vec![Vec::new(); spec.partitions as usize],
            },
        );
        Ok(())
    }
}

pub struct MemoryWriter {
    shared: Arc<Shared>,
}

#[async_trait]
impl RecordWriter for MemoryWriter {
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), StreamError> {
        let delay = self.shared.lock().faults.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.shared.lock();
            if state.faults.failing_writes > 0 {
                state.faults.failing_writes -= 1;
                return Err(StreamError::transient("not enough in-sync replicas"));
            }

            let next = state.next_partition;
            state.next_partition = next.wrapping_add(1);

            let log = state
                .topics
                .get_mut(topic)
                .ok_or_else(|| StreamError::permanent(format!("unknown topic {topic:?}")))?;
            let count = log.partitions.len();
            log.partitions[next % count].push(payload.to_vec());
        }

        self.shared.appended.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), StreamError> {
        Ok(())
    }
}

pub struct MemoryReader {
    shared: Arc<Shared>,
    topic: String,
    group: String,
    /// partition -> next offset to hand out
    positions: HashMap<i32, usize>,
    min_bytes: usize,
    max_wait: Duration,
    max_records: usize,
    closed: bool,
}

impl MemoryReader {
    fn position(&self, state: &State, partition: i32) -> usize {
        self.positions.get(&partition).copied().unwrap_or_else(|| {
            state
                .committed
                .get(&(self.group.clone(), self.topic.clone(), partition))
                .copied()
                .unwrap_or(0)
        })
    }

    fn buffered_bytes(&self, state: &State, log: &MemoryTopic) -> usize {
        log.partitions
            .iter()
            .enumerate()
            .map(|(p, entries)| {
                let start = self.position(state, p as i32);
                entries.iter().skip(start).map(Vec::len).sum::<usize>()
            })
            .sum()
    }

    /// Hand out pending records in partition order, advancing positions.
    fn take(&mut self, state: &State) -> Vec<Record> {
        let Some(log) = state.topics.get(&self.topic) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for (p, entries) in log.partitions.iter().enumerate() {
            let partition = p as i32;
            let start = self.position(state, partition);
            let mut next = start;
            for payload in entries.iter().skip(start) {
                if records.len() >= self.max_records {
                    break;
                }
                records.push(Record::new(&self.topic, partition, next.to_string(), payload.clone()));
                next += 1;
            }
            self.positions.insert(partition, next);
        }
        records
    }
}

#[async_trait]
impl RecordReader for MemoryReader {
    async fn poll(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Fetch, StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if *shutdown.borrow() {
            return Err(StreamError::Cancelled("shutdown before poll".into()));
        }

        let deadline = Instant::now() + self.max_wait;
        let shared = self.shared.clone();

        loop {
            let notified = shared.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = shared.lock();
                if !state.topics.contains_key(&self.topic) {
                    return Err(StreamError::Fetch(format!("unknown topic {:?}", self.topic)));
                }
                let errors = std::mem::take(&mut state.faults.fetch_errors);
                let ready = match state.topics.get(&self.topic) {
                    Some(log) => self.buffered_bytes(&state, log) >= self.min_bytes.max(1),
                    None => false,
                };
                if ready || !errors.is_empty() || Instant::now() >= deadline {
                    let records = self.take(&state);
                    debug!(topic = %self.topic, records = records.len(), "Memory poll");
                    return Ok(Fetch { records, errors });
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(StreamError::Cancelled("shutdown during poll".into()));
                    }
                }
            }
        }
    }

    async fn commit(&mut self) -> Result<(), StreamError> {
        let mut state = self.shared.lock();
        if state.faults.failing_commits > 0 {
            state.faults.failing_commits -= 1;
            return Err(StreamError::Commit("coordinator not available".into()));
        }
        for (partition, offset) in &self.positions {
            state
                .committed
                .insert((self.group.clone(), self.topic.clone(), *partition), *offset);
        }
        state.commits += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker_config() -> WorkerConfig {
        WorkerConfig::new("receipts", "g").with_fetch(1, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_create_topic_twice_reports_exists() {
        let broker = MemoryBroker::new();
        let spec = TopicSpec::new("receipts", 2, 1);

        broker.admin().create_topic(&spec).await.unwrap();
        let err = broker.admin().create_topic(&spec).await.unwrap_err();
        assert!(matches!(err, StreamError::TopicExists(name) if name == "receipts"));
    }

    #[tokio::test]
    async fn test_writes_spread_over_partitions_and_read_back() {
        let broker = MemoryBroker::new();
        broker.admin().create_topic(&TopicSpec::new("receipts", 2, 1)).await.unwrap();

        let writer = broker.writer();
        for i in 0..4u8 {
            writer.write("receipts", &[i]).await.unwrap();
        }

        let (_tx, mut rx) = watch::channel(false);
        let mut reader = broker.reader(&worker_config());
        let fetch = reader.poll(&mut rx).await.unwrap();
        assert_eq!(fetch.records.len(), 4);
        assert_eq!(fetch.records[0].partition, 0);
        assert_eq!(fetch.records[2].partition, 1);
    }

    #[tokio::test]
    async fn test_uncommitted_records_are_redelivered_to_new_reader() {
        let broker = MemoryBroker::new();
        broker.admin().create_topic(&TopicSpec::new("receipts", 1, 1)).await.unwrap();
        broker.append_raw("receipts", 0, b"a".to_vec()).unwrap();

        let (_tx, mut rx) = watch::channel(false);
        let mut first = broker.reader(&worker_config());
        assert_eq!(first.poll(&mut rx).await.unwrap().records.len(), 1);

        let mut second = broker.reader(&worker_config());
        assert_eq!(second.poll(&mut rx).await.unwrap().records.len(), 1);

        second.commit().await.unwrap();
        let mut third = broker.reader(&worker_config());
        assert!(third.poll(&mut rx).await.unwrap().records.is_empty());
        assert_eq!(broker.committed_offset("g", "receipts", 0), Some(1));
    }

    #[tokio::test]
    async fn test_poll_empty_after_max_wait() {
        let broker = MemoryBroker::new();
        broker.admin().create_topic(&TopicSpec::new("receipts", 1, 1)).await.unwrap();

        let (_tx, mut rx) = watch::channel(false);
        let mut reader = broker.reader(&worker_config());
        let fetch = reader.poll(&mut rx).await.unwrap();
        assert!(fetch.is_empty());
    }

    #[tokio::test]
    async fn test_poll_cancelled_by_shutdown() {
        let broker = MemoryBroker::new();
        broker.admin().create_topic(&TopicSpec::new("receipts", 1, 1)).await.unwrap();

        let config = WorkerConfig::new("receipts", "g").with_fetch(1, Duration::from_secs(30));
        let mut reader = broker.reader(&config);
        let (tx, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move { reader.poll(&mut rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let broker = MemoryBroker::new();
        broker.admin().create_topic(&TopicSpec::new("receipts", 1, 1)).await.unwrap();
        broker.fail_next_commits(1);

        let mut reader = broker.reader(&worker_config());
        assert!(matches!(reader.commit().await, Err(StreamError::Commit(_))));
        assert!(reader.commit().await.is_ok());
        assert_eq!(broker.commit_count(), 1);
    }
}
