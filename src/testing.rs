//! Fixture plugins for exercising cycles without touching the host

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricBatch, MetricKind};
use crate::plugin::Plugin;
use crate::sink::MetricSink;
use crate::source::MetricSource;

/// Produces `count` gauges named `m0..mN` with value equal to their index
#[derive(Debug, Clone)]
pub struct CountingSource {
    name: String,
    enabled: bool,
    count: usize,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            count,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside every produce call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Number of produce calls so far, shared with clones
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Highest number of produce calls observed in flight at once
    pub fn max_active(&self) -> Arc<AtomicUsize> {
        self.max_active.clone()
    }
}

impl Plugin for CountingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn configure(&mut self, _config: &ConfigSnapshot) {}
}

#[async_trait::async_trait]
impl MetricSource for CountingSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        Ok((0..self.count)
            .map(|i| {
                Metric::new(
                    self.name.as_str(),
                    self.name.as_str(),
                    MetricKind::Gauge,
                    format!("m{}", i),
                    i as u64,
                    fields! { "unit" => "Count" },
                )
            })
            .collect())
    }
}

/// How a misbehaving fixture source fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misbehaviour {
    Fail,
    Hang,
    Panic,
}

/// A source that never produces anything
#[derive(Debug, Clone)]
pub struct BrokenSource {
    name: String,
    how: Misbehaviour,
}

impl BrokenSource {
    pub fn new(name: &str, how: Misbehaviour) -> Self {
        Self {
            name: name.to_string(),
            how,
        }
    }
}

impl Plugin for BrokenSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn set_enabled(&mut self, _enabled: bool) {}

    fn configure(&mut self, _config: &ConfigSnapshot) {}
}

#[async_trait::async_trait]
impl MetricSource for BrokenSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        match self.how {
            Misbehaviour::Fail => Err(MetricsdError::source_failed(&self.name, "fixture failure")),
            Misbehaviour::Hang => std::future::pending().await,
            Misbehaviour::Panic => panic!("fixture panic in {}", self.name),
        }
    }
}

/// Remembers every batch it is handed
#[derive(Debug, Clone)]
pub struct RecordingSink {
    name: String,
    enabled: bool,
    how: Option<Misbehaviour>,
    batches: Arc<Mutex<Vec<MetricBatch>>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            how: None,
            batches: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail or hang on every send, still counting the attempt
    pub fn misbehaving(mut self, how: Misbehaviour) -> Self {
        self.how = Some(how);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Shared view of the batches received so far
    pub fn batches(&self) -> Arc<Mutex<Vec<MetricBatch>>> {
        self.batches.clone()
    }

    /// Shared count of send calls, including failed ones
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

impl Plugin for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn configure(&mut self, _config: &ConfigSnapshot) {}
}

#[async_trait::async_trait]
impl MetricSink for RecordingSink {
    async fn send(&self, batch: &MetricBatch) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.how {
            None => {
                self.batches.lock().unwrap().push(batch.clone());
                Ok(())
            }
            Some(Misbehaviour::Hang) => std::future::pending().await,
            Some(Misbehaviour::Panic) => panic!("fixture panic in {}", self.name),
            Some(Misbehaviour::Fail) => Err(MetricsdError::sink_failed(&self.name, "fixture failure")),
        }
    }
}

/// Batch sizes seen by a recording sink
pub fn batch_sizes(batches: &Arc<Mutex<Vec<MetricBatch>>>) -> Vec<usize> {
    batches.lock().unwrap().iter().map(MetricBatch::len).collect()
}
