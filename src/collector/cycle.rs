use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::CycleConfig;
use super::dispatch::{BatchDispatcher, DispatchReport};
use super::fanout::{Orchestrator, SourceOutcome, SourceReport};
use crate::metric::HostResolver;
use crate::sink::MetricSink;
use crate::source::MetricSource;

/// Summary of one complete cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle number, starting at 0
    pub cycle: u64,
    pub sources: Vec<SourceReport>,
    pub dispatch: DispatchReport,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Sources that did not complete
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|r| r.outcome != SourceOutcome::Completed)
    }
}

/// Everything needed to run a cycle: fan-out over the sources, fan-in into the dispatcher
pub struct Pipeline {
    orchestrator: Orchestrator,
    sinks: Arc<Vec<Arc<dyn MetricSink>>>,
    resolver: Arc<HostResolver>,
    config: CycleConfig,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Arc<dyn MetricSource>>,
        sinks: Vec<Arc<dyn MetricSink>>,
        resolver: HostResolver,
        config: CycleConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(sources, config.source_timeout),
            sinks: Arc::new(sinks),
            resolver: Arc::new(resolver),
            config,
        }
    }

    /// Run one cycle to completion. Never fails: problems are logged and
    /// show up in the report.
    pub async fn run_cycle(&self, cycle: u64, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let dispatcher = BatchDispatcher::new(self.sinks.clone(), self.resolver.clone(), self.config.sink_timeout);
        let dispatch_task = tokio::spawn(dispatcher.run(rx, cancel.child_token()));

        let sources = self.orchestrator.fan_out(tx, cancel).await;

        let dispatch = match dispatch_task.await {
            Ok(report) => report,
            Err(e) => {
                error!("Dispatcher for cycle {} died: {}", cycle, e);
                DispatchReport::default()
            }
        };

        let report = CycleReport {
            cycle,
            sources,
            dispatch,
            elapsed: started.elapsed(),
        };

        for failed in report.failed_sources() {
            info!("Cycle {}: source {} {}", cycle, failed.source, failed.outcome);
        }
        info!(
            "Cycle {} done in {:?}: {} metrics from {} sources, {} batches, {} failed sends",
            cycle,
            report.elapsed,
            report.dispatch.records,
            report.sources.len(),
            report.dispatch.batches,
            report.dispatch.sink_failures
        );

        report
    }
}
