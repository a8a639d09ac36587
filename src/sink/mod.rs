//! Delivery destinations and the contract they implement

pub mod graphite;
#[cfg(feature = "http-sink")]
pub mod http;
pub mod log;
pub mod stdout;

use crate::error::Result;
use crate::metric::MetricBatch;
use crate::plugin::Plugin;

pub use self::graphite::GraphiteSink;
#[cfg(feature = "http-sink")]
pub use self::http::HttpSink;
pub use self::log::LogSink;
pub use self::stdout::StdoutSink;

/// Trait for sinks that deliver whole batches
#[async_trait::async_trait]
pub trait MetricSink: Plugin {
    /// Deliver one batch. Records that cannot be encoded for this sink are
    /// skipped and logged; the rest of the batch still goes out.
    async fn send(&self, batch: &MetricBatch) -> Result<()>;
}
