//! Prometheus metrics and the consumer throughput ticker.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Call this once at startup. Subsequent calls are no-ops. A recorder that cannot
/// be installed is logged and the process keeps running without metrics.
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_try_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics initialized");
            Ok(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            Err(())
        }
    });
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Consumer side counters labelled by topic.
#[derive(Clone)]
pub struct ConsumerMetrics {
    topic: String,
}

impl ConsumerMetrics {
    pub fn new(topic: impl Into<String>) -> Self {
        Self { topic: topic.into() }
    }

    pub fn records_received(&self, count: usize) {
        counter!("receipt_records_received_total", "topic" => self.topic.clone()).increment(count as u64);
    }

    pub fn records_undecodable(&self, count: usize) {
        counter!("receipt_records_undecodable_total", "topic" => self.topic.clone()).increment(count as u64);
    }

    pub fn batch_forwarded(&self, status: &'static str) {
        counter!("receipt_batches_forwarded_total", "topic" => self.topic.clone(), "status" => status).increment(1);
    }

    pub fn commit_failed(&self) {
        counter!("receipt_commit_failures_total", "topic" => self.topic.clone()).increment(1);
    }

    pub fn poll_failed(&self) {
        counter!("receipt_poll_failures_total", "topic" => self.topic.clone()).increment(1);
    }
}

/// Records and bytes received since the last report.
#[derive(Debug, Default)]
pub struct Throughput {
    records: AtomicU64,
    bytes: AtomicU64,
}

impl Throughput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, bytes: usize) {
        self.records.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Swap both counters to zero, returning `(records, bytes)`.
    pub fn take(&self) -> (u64, u64) {
        (
            self.records.swap(0, Ordering::Relaxed),
            self.bytes.swap(0, Ordering::Relaxed),
        )
    }
}

/// Report throughput every `interval` until shutdown is signalled.
pub fn spawn_throughput_ticker(
    throughput: Arc<Throughput>,
    topic: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        let seconds = interval.as_secs_f64().max(f64::EPSILON);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (records, bytes) = throughput.take();
                    let records_per_sec = records as f64 / seconds;
                    let bytes_per_sec = bytes as f64 / seconds;
                    debug!(topic = %topic, records_per_sec, bytes_per_sec, "Consumer throughput");
                    gauge!("receipt_consumer_records_per_second", "topic" => topic.clone()).set(records_per_sec);
                    gauge!("receipt_consumer_bytes_per_second", "topic" => topic.clone()).set(bytes_per_sec);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
