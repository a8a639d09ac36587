//! Metric sources and the contract they implement

pub mod cpu;
pub mod diskspace;
pub mod iostat;
pub mod loadavg;
pub mod sockets;
pub mod vmstat;

use std::path::{Path, PathBuf};

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::metric::Metric;
use crate::plugin::Plugin;

pub use cpu::CpuSource;
pub use diskspace::DiskspaceSource;
pub use iostat::IostatSource;
pub use loadavg::LoadAvgSource;
pub use sockets::SocketsSource;
pub use vmstat::VmstatSource;

/// Default mount point of the proc filesystem
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Trait for sources that produce metrics once per cycle
#[async_trait::async_trait]
pub trait MetricSource: Plugin {
    /// Take one reading. The returned order is kept all the way to the sinks.
    async fn produce(&self) -> Result<Vec<Metric>>;
}

/// Root of the proc filesystem for a source, from its `proc_root` key
pub(crate) fn proc_root(config: &ConfigSnapshot, section: &str) -> PathBuf {
    config
        .get(section, "proc_root")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
}

/// Read a proc file, attributing failures to `source`
pub(crate) async fn read_proc(source: &str, path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MetricsdError::source_failed(source, format!("reading {}: {}", path.display(), e)))
}

/// Parse one numeric field of a proc file
pub(crate) fn parse_field(source: &str, field: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| MetricsdError::source_failed(source, format!("bad {} value {:?}: {}", field, raw, e)))
}
