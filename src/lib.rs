//! A periodic metrics daemon: pluggable sources, batched delivery to pluggable sinks

pub mod collector;
pub mod config;
pub mod error;
pub mod metric;
pub mod plugin;
pub mod process;
pub mod registry;
pub mod sink;
pub mod source;
pub mod util;

#[cfg(test)]
mod testing;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::collector::{CycleConfig, CycleReport, Pipeline, Scheduler};
    pub use crate::config::{ConfigBuilder, ConfigSnapshot, Settings};
    pub use crate::error::{MetricsdError, Result};
    pub use crate::metric::{HostResolver, Metric, MetricBatch, MetricKind, MetricValue};
    pub use crate::plugin::Plugin;
    pub use crate::sink::MetricSink;
    pub use crate::source::MetricSource;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
