use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metric::{HostResolver, Metric, MetricBatch};
use crate::sink::MetricSink;

/// Number of metrics that seals a batch
pub const BATCH_SIZE: usize = 10;

/// What the dispatcher did during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Metrics received from the fan-in channel
    pub records: usize,
    /// Batches sealed and handed to the sinks
    pub batches: usize,
    /// Successful sink sends
    pub deliveries: usize,
    /// Failed, timed out or cancelled sink sends
    pub sink_failures: usize,
}

/// Single consumer of a cycle's merged stream.
///
/// Resolves each metric's host, groups metrics into batches of
/// [`BATCH_SIZE`] in arrival order and hands each sealed batch to every
/// enabled sink, one sink after the other.
pub struct BatchDispatcher {
    sinks: Arc<Vec<Arc<dyn MetricSink>>>,
    resolver: Arc<HostResolver>,
    sink_timeout: Duration,
    pending: Vec<Metric>,
    next_sequence: u64,
    report: DispatchReport,
}

impl BatchDispatcher {
    pub fn new(sinks: Arc<Vec<Arc<dyn MetricSink>>>, resolver: Arc<HostResolver>, sink_timeout: Duration) -> Self {
        Self {
            sinks,
            resolver,
            sink_timeout,
            pending: Vec::with_capacity(BATCH_SIZE),
            next_sequence: 0,
            report: DispatchReport::default(),
        }
    }

    /// Consume the stream until every sender is gone, then flush what is left
    pub async fn run(mut self, mut rx: mpsc::Receiver<Metric>, cancel: CancellationToken) -> DispatchReport {
        while let Some(mut metric) = rx.recv().await {
            metric.enrich(&self.resolver);
            self.pending.push(metric);
            self.report.records += 1;

            if self.pending.len() >= BATCH_SIZE {
                self.flush(&cancel).await;
            }
        }

        if !self.pending.is_empty() {
            self.flush(&cancel).await;
        }

        debug!(
            "Dispatched {} metrics in {} batches ({} failed sends)",
            self.report.records, self.report.batches, self.report.sink_failures
        );
        self.report
    }

    async fn flush(&mut self, cancel: &CancellationToken) {
        let metrics = std::mem::replace(&mut self.pending, Vec::with_capacity(BATCH_SIZE));
        let batch = Arc::new(MetricBatch::new(self.next_sequence, metrics));
        self.next_sequence += 1;
        self.report.batches += 1;

        for sink in self.sinks.iter().filter(|s| s.enabled()) {
            if deliver(sink.clone(), batch.clone(), self.sink_timeout, cancel).await {
                self.report.deliveries += 1;
            } else {
                self.report.sink_failures += 1;
            }
        }
    }
}

/// Send one batch to one sink. Returns whether the send succeeded.
///
/// The send runs in its own task so a panicking sink only loses this batch.
async fn deliver(
    sink: Arc<dyn MetricSink>,
    batch: Arc<MetricBatch>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> bool {
    let name = sink.name().to_string();
    let sequence = batch.sequence;
    let size = batch.len();

    let handle = tokio::spawn(async move { sink.send(&batch).await });
    let abort = handle.abort_handle();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            abort.abort();
            warn!("Sink {} send of batch {} cancelled", name, sequence);
            false
        }
        joined = tokio::time::timeout(timeout, handle) => match joined {
            Ok(Ok(Ok(()))) => {
                debug!("Sink {} accepted batch {} ({} metrics)", name, sequence, size);
                true
            }
            Ok(Ok(Err(e))) => {
                error!("Sink {} failed on batch {}: {}", name, sequence, e);
                false
            }
            Ok(Err(e)) => {
                error!("Sink {} crashed on batch {}: {}", name, sequence, e);
                false
            }
            Err(_) => {
                abort.abort();
                error!("Sink {} timed out on batch {} after {:?}", name, sequence, timeout);
                false
            }
        }
    }
}
