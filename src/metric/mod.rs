//! Canonical metric record and its batches

mod format;
mod host;

pub use format::SCHEMA_VERSION;
pub use host::HostResolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MetricsdError, Result};
use crate::util::local_hostname;

/// Auxiliary fields attached to a metric (unit, mountpoint, device, ...)
pub type FieldsMap = BTreeMap<String, serde_json::Value>;

/// How a metric's value should be interpreted downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value
    Gauge,
    /// Per-interval change
    Rate,
    /// Monotonic counter
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// JSON representation. Non-finite floats have none.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            MetricValue::Int(v) => Ok((*v).into()),
            MetricValue::Uint(v) => Ok((*v).into()),
            MetricValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .ok_or_else(|| MetricsdError::Encode(format!("non-finite value {}", v))),
            MetricValue::Text(v) => Ok(serde_json::Value::String(v.clone())),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Uint(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v.into())
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Uint(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Uint(v.into())
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// One observed value at one point in time.
///
/// A metric is built by its source and is read-only from then on. The only
/// change made after it leaves the source is host resolution, done once by
/// the dispatcher before batching.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    collector: String,
    from: String,
    path: String,
    name: String,
    value: MetricValue,
    timestamp: DateTime<Utc>,
    precision: u32,
    host: String,
    metric_type: MetricKind,
    ttl: u32,
    data: FieldsMap,
    tags: FieldsMap,
}

impl Metric {
    /// Build a metric stamped with the current time and the local hostname
    pub fn new(
        collector: impl Into<String>,
        from: impl Into<String>,
        metric_type: MetricKind,
        name: impl Into<String>,
        value: impl Into<MetricValue>,
        data: FieldsMap,
    ) -> Self {
        Self {
            collector: collector.into(),
            from: from.into(),
            path: String::new(),
            name: name.into(),
            value: value.into(),
            timestamp: Utc::now(),
            precision: 0,
            host: local_hostname().to_string(),
            metric_type,
            ttl: 0,
            data,
            tags: FieldsMap::new(),
        }
    }

    /// Override the namespace used in hierarchical keys
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the creation instant explicitly (replaying a reading taken earlier)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Resolve the host for this metric. Runs once, in the dispatcher.
    pub(crate) fn enrich(&mut self, resolver: &HostResolver) {
        self.host = resolver.resolve(&self.collector).to_string();
    }

    pub fn collector(&self) -> &str {
        &self.collector
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn metric_type(&self) -> MetricKind {
        self.metric_type
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn data(&self) -> &FieldsMap {
        &self.data
    }

    pub fn tags(&self) -> &FieldsMap {
        &self.tags
    }

    /// Namespace used in hierarchical keys: `path` when set, `from` otherwise
    pub fn namespace(&self) -> &str {
        if self.path.is_empty() {
            &self.from
        } else {
            &self.path
        }
    }
}

/// An ordered group of metrics delivered together to every enabled sink
#[derive(Debug, Clone)]
pub struct MetricBatch {
    /// Position of this batch within its cycle, starting at 0
    pub sequence: u64,
    /// The metrics, in arrival order
    pub metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn new(sequence: u64, metrics: Vec<Metric>) -> Self {
        Self { sequence, metrics }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Metric> {
        self.metrics.iter()
    }
}

/// Build a [`FieldsMap`] from string pairs
#[macro_export]
macro_rules! fields {
    () => { $crate::metric::FieldsMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::metric::FieldsMap::new();
        $( map.insert(($key).to_string(), ::serde_json::Value::from($value)); )+
        map
    }};
}
