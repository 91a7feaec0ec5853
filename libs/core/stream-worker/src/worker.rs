//! Consumer loop.
//!
//! One cycle is `poll -> decode -> forward -> commit`. Undecodable records are
//! logged and dropped, and the batch is committed once the sink returns, whatever
//! its outcome. `run` repeats cycles until the shutdown signal is observed.

use crate::client::RecordReader;
use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::metrics::{spawn_throughput_ticker, ConsumerMetrics, Throughput};
use crate::registry::{StreamJob, StreamProcessor};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing decodable arrived; no forward and no commit happened.
    Empty,
    /// A batch went to the sink and a commit was attempted.
    Forwarded { received: usize, decoded: usize },
}

/// Generic consumer that decodes records into `J` and hands batches to `P`.
pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    reader: Box<dyn RecordReader>,
    processor: Arc<P>,
    config: WorkerConfig,
    throughput: Arc<Throughput>,
    metrics: ConsumerMetrics,
    _phantom: PhantomData<J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J> + 'static,
{
    pub fn new(reader: Box<dyn RecordReader>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = ConsumerMetrics::new(&config.topic);
        Self {
            reader,
            processor,
            config,
            throughput: Arc::new(Throughput::new()),
            metrics,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Counters fed by every received record.
    pub fn throughput(&self) -> Arc<Throughput> {
        self.throughput.clone()
    }

    /// Run cycles until shutdown. Poll failures back off exponentially, capped at
    /// `max_backoff`; a cancelled poll ends the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            topic = %self.config.topic,
            group = %self.config.consumer_group,
            consumer_id = %self.config.consumer_id,
            processor = %self.processor.name(),
            fetch_min_bytes = self.config.fetch_min_bytes,
            fetch_max_wait_ms = self.config.fetch_max_wait.as_millis() as u64,
            "Starting stream worker"
        );

        let ticker = spawn_throughput_ticker(
            self.throughput.clone(),
            self.config.topic.clone(),
            self.config.throughput_interval,
            shutdown.clone(),
        );

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.consume_once(&mut shutdown).await {
                Ok(outcome) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Broker recovered");
                        consecutive_errors = 0;
                    }
                    if let CycleOutcome::Forwarded { received, decoded } = outcome {
                        debug!(received, decoded, "Cycle complete");
                    }
                }
                Err(e) if e.is_cancelled() => {
                    info!("Poll cancelled, stopping worker");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.metrics.poll_failed();
                    let backoff = self.backoff(consecutive_errors);
                    warn!(
                        error = %e,
                        consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "Poll failed, backing off"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        ticker.abort();
        info!(topic = %self.config.topic, "Stream worker stopped");
        Ok(())
    }

    fn backoff(&self, consecutive_errors: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_errors.saturating_sub(1).min(16));
        INITIAL_BACKOFF.saturating_mul(factor).min(self.config.max_backoff)
    }

    /// One poll/decode/forward/commit cycle.
    ///
    /// Partition errors fail the cycle as [`StreamError::Fetch`]. Sink and commit
    /// failures are logged and do not fail it.
    pub async fn consume_once(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleOutcome, StreamError> {
        let fetch = self.reader.poll(shutdown).await?;

        if let Some(errors) = fetch.joined_errors() {
            return Err(StreamError::Fetch(errors));
        }

        let received = fetch.records.len();
        if received == 0 {
            return Ok(CycleOutcome::Empty);
        }
        self.metrics.records_received(received);

        let mut batch = Vec::with_capacity(received);
        for record in fetch.records {
            self.throughput.record(record.len());
            match serde_json::from_slice::<J>(&record.payload) {
                Ok(job) => batch.push(job),
                Err(e) => {
                    self.metrics.records_undecodable(1);
                    warn!(
                        topic = %record.topic,
                        partition = record.partition,
                        id = %record.id,
                        error = %e,
                        "Dropping undecodable record"
                    );
                }
            }
        }

        let decoded = batch.len();
        if decoded == 0 {
            return Ok(CycleOutcome::Empty);
        }

        debug!(processor = %self.processor.name(), batch = decoded, "Forwarding batch");
        match self.processor.process(batch).await {
            Ok(()) => self.metrics.batch_forwarded("success"),
            Err(e) => {
                self.metrics.batch_forwarded("failed");
                error!(
                    processor = %self.processor.name(),
                    error = %e,
                    category = ?e.category(),
                    batch = decoded,
                    "Sink failed to process batch"
                );
            }
        }

        if let Err(e) = self.reader.commit().await {
            self.metrics.commit_failed();
            error!(topic = %self.config.topic, error = %e, "Offset commit failed, batch may be redelivered");
        }

        Ok(CycleOutcome::Forwarded { received, decoded })
    }

    /// Release the reader. Call after `run` returned.
    pub async fn close(mut self) -> Result<(), StreamError> {
        self.reader.close().await?;
        info!(topic = %self.config.topic, "Consumer closed");
        Ok(())
    }
}
