use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metric::Metric;
use crate::source::MetricSource;

/// How one source's part of a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Completed,
    Failed(String),
    TimedOut,
    Cancelled,
    Panicked,
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOutcome::Completed => f.write_str("completed"),
            SourceOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            SourceOutcome::TimedOut => f.write_str("timed out"),
            SourceOutcome::Cancelled => f.write_str("cancelled"),
            SourceOutcome::Panicked => f.write_str("panicked"),
        }
    }
}

/// What one source contributed to a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    /// Metrics returned by produce
    pub produced: usize,
    /// Metrics that made it onto the channel
    pub forwarded: usize,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    fn new(source: &str, outcome: SourceOutcome) -> Self {
        Self {
            source: source.to_string(),
            produced: 0,
            forwarded: 0,
            outcome,
        }
    }
}

/// Runs every enabled source concurrently and merges their output onto one channel
pub struct Orchestrator {
    sources: Vec<Arc<dyn MetricSource>>,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(sources: Vec<Arc<dyn MetricSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Spawn one worker per enabled source and wait for all of them.
    ///
    /// `tx` is consumed: once every worker has finished, the last sender is
    /// gone and the receiving side sees the end of the stream.
    pub async fn fan_out(&self, tx: mpsc::Sender<Metric>, cancel: &CancellationToken) -> Vec<SourceReport> {
        let mut workers: Vec<(String, JoinHandle<SourceReport>)> = Vec::new();

        for source in self.sources.iter().filter(|s| s.enabled()) {
            let name = source.name().to_string();
            let handle = tokio::spawn(run_worker(
                source.clone(),
                tx.clone(),
                self.timeout,
                cancel.child_token(),
            ));
            workers.push((name, handle));
        }
        drop(tx);

        let mut reports = Vec::with_capacity(workers.len());
        for (name, handle) in workers {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) if e.is_panic() => {
                    error!("Source {} panicked", name);
                    SourceReport::new(&name, SourceOutcome::Panicked)
                }
                Err(e) => {
                    warn!("Source {} worker was aborted: {}", name, e);
                    SourceReport::new(&name, SourceOutcome::Cancelled)
                }
            };
            reports.push(report);
        }

        reports
    }
}

async fn run_worker(
    source: Arc<dyn MetricSource>,
    tx: mpsc::Sender<Metric>,
    timeout: Duration,
    cancel: CancellationToken,
) -> SourceReport {
    let name = source.name().to_string();

    let metrics = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Source {} cancelled before producing", name);
            return SourceReport::new(&name, SourceOutcome::Cancelled);
        }
        result = tokio::time::timeout(timeout, source.produce()) => match result {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                error!("Source {} failed: {}", name, e);
                return SourceReport::new(&name, SourceOutcome::Failed(e.to_string()));
            }
            Err(_) => {
                error!("Source {} timed out after {:?}", name, timeout);
                return SourceReport::new(&name, SourceOutcome::TimedOut);
            }
        }
    };

    let mut report = SourceReport::new(&name, SourceOutcome::Completed);
    report.produced = metrics.len();

    for metric in metrics {
        tokio::select! {
            _ = cancel.cancelled() => {
                report.outcome = SourceOutcome::Cancelled;
                break;
            }
            sent = tx.send(metric) => {
                if sent.is_err() {
                    warn!("Dispatcher went away, dropping the rest of {}", name);
                    report.outcome = SourceOutcome::Cancelled;
                    break;
                }
                report.forwarded += 1;
            }
        }
    }

    debug!("Source {} forwarded {}/{} metrics", name, report.forwarded, report.produced);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenSource, CountingSource, Misbehaviour};

    async fn drain(mut rx: mpsc::Receiver<Metric>) -> Vec<Metric> {
        let mut out = Vec::new();
        while let Some(metric) = rx.recv().await {
            out.push(metric);
        }
        out
    }

    #[tokio::test]
    async fn test_fan_out_merges_every_source() {
        let orchestrator = Orchestrator::new(
            vec![
                Arc::new(CountingSource::new("a", 3)),
                Arc::new(CountingSource::new("b", 12)),
                Arc::new(CountingSource::new("c", 0)),
            ],
            Duration::from_secs(5),
        );

        let (tx, rx) = mpsc::channel(4);
        let consumer = tokio::spawn(drain(rx));
        let reports = orchestrator.fan_out(tx, &CancellationToken::new()).await;
        let metrics = consumer.await.unwrap();

        assert_eq!(metrics.len(), 15);
        assert_eq!(reports.iter().map(|r| r.forwarded).sum::<usize>(), 15);
        assert!(reports.iter().all(|r| r.outcome == SourceOutcome::Completed));
    }

    #[tokio::test]
    async fn test_per_source_order_is_kept() {
        let orchestrator = Orchestrator::new(
            vec![
                Arc::new(CountingSource::new("a", 25)),
                Arc::new(CountingSource::new("b", 25)),
            ],
            Duration::from_secs(5),
        );

        let (tx, rx) = mpsc::channel(2);
        let consumer = tokio::spawn(drain(rx));
        orchestrator.fan_out(tx, &CancellationToken::new()).await;
        let metrics = consumer.await.unwrap();

        for source in ["a", "b"] {
            let names: Vec<&str> = metrics
                .iter()
                .filter(|m| m.collector() == source)
                .map(|m| m.name())
                .collect();
            let expected: Vec<String> = (0..25).map(|i| format!("m{}", i)).collect();
            assert_eq!(names, expected);
        }
    }

    #[tokio::test]
    async fn test_disabled_sources_are_skipped() {
        let disabled = CountingSource::new("off", 5).disabled();
        let calls = disabled.calls();
        let orchestrator = Orchestrator::new(
            vec![Arc::new(disabled), Arc::new(CountingSource::new("on", 2))],
            Duration::from_secs(5),
        );

        let (tx, rx) = mpsc::channel(8);
        let consumer = tokio::spawn(drain(rx));
        let reports = orchestrator.fan_out(tx, &CancellationToken::new()).await;

        assert_eq!(consumer.await.unwrap().len(), 2);
        assert_eq!(reports.len(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_sources_are_isolated() {
        let orchestrator = Orchestrator::new(
            vec![
                Arc::new(BrokenSource::new("failing", Misbehaviour::Fail)),
                Arc::new(CountingSource::new("good", 4)),
                Arc::new(BrokenSource::new("hanging", Misbehaviour::Hang)),
                Arc::new(BrokenSource::new("panicking", Misbehaviour::Panic)),
            ],
            Duration::from_secs(2),
        );

        let (tx, rx) = mpsc::channel(8);
        let consumer = tokio::spawn(drain(rx));
        let reports = orchestrator.fan_out(tx, &CancellationToken::new()).await;

        assert_eq!(consumer.await.unwrap().len(), 4);
        assert!(matches!(reports[0].outcome, SourceOutcome::Failed(_)));
        assert_eq!(reports[1].outcome, SourceOutcome::Completed);
        assert_eq!(reports[2].outcome, SourceOutcome::TimedOut);
        assert_eq!(reports[3].outcome, SourceOutcome::Panicked);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_workers() {
        let orchestrator = Orchestrator::new(
            vec![Arc::new(BrokenSource::new("hanging", Misbehaviour::Hang))],
            Duration::from_secs(3600),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, rx) = mpsc::channel(1);
        let reports = orchestrator.fan_out(tx, &cancel).await;
        assert_eq!(reports[0].outcome, SourceOutcome::Cancelled);
        assert!(drain(rx).await.is_empty());
    }
}
