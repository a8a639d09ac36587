use std::path::PathBuf;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::source::{self, MetricSource};

const NAME: &str = "cpu";

/// Column names of a `cpu` line in `/proc/stat`, in file order
const COLUMNS: [&str; 10] = [
    "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal", "guest", "guest_nice",
];

/// Jiffy counters for one cpu line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuStat {
    /// `total` for the aggregate line, `cpuN` otherwise
    pub core: String,
    /// Values for [`COLUMNS`]; older kernels report fewer columns
    pub values: Vec<(&'static str, u64)>,
}

/// Parse the `cpu*` lines of `/proc/stat`
pub fn parse_stat(text: &str) -> Result<Vec<CpuStat>> {
    let mut stats = Vec::new();

    for line in text.lines().filter(|l| l.starts_with("cpu")) {
        let mut fields = line.split_whitespace();
        let Some(id) = fields.next() else {
            continue;
        };

        let core = if id == "cpu" { "total".to_string() } else { id.to_string() };
        let values = COLUMNS
            .iter()
            .zip(fields)
            .map(|(column, raw)| Ok((*column, source::parse_field(NAME, column, raw)?)))
            .collect::<Result<Vec<_>>>()?;

        if values.len() < 4 {
            return Err(MetricsdError::source_failed(NAME, format!("short cpu line {:?}", line)));
        }

        stats.push(CpuStat { core, values });
    }

    if stats.is_empty() {
        return Err(MetricsdError::source_failed(NAME, "no cpu lines in stat"));
    }

    Ok(stats)
}

/// Per-core cpu time counters
#[derive(Debug)]
pub struct CpuSource {
    enabled: bool,
    proc_root: PathBuf,
    per_core: bool,
}

impl Default for CpuSource {
    fn default() -> Self {
        Self {
            enabled: false,
            proc_root: PathBuf::from(source::DEFAULT_PROC_ROOT),
            per_core: true,
        }
    }
}

impl Plugin for CpuSource {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn configure(&mut self, config: &ConfigSnapshot) {
        self.proc_root = source::proc_root(config, NAME);
        self.per_core = config.get_bool(NAME, "per_core").unwrap_or(true);
    }
}

#[async_trait::async_trait]
impl MetricSource for CpuSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let text = source::read_proc(NAME, &self.proc_root.join("stat")).await?;

        let mut report = Vec::new();
        for stat in parse_stat(&text)? {
            if !self.per_core && stat.core != "total" {
                continue;
            }

            for (name, value) in &stat.values {
                report.push(
                    Metric::new(
                        NAME,
                        NAME,
                        MetricKind::Counter,
                        *name,
                        *value,
                        fields! { "core" => stat.core.as_str(), "unit" => "Jiff", "name" => *name },
                    )
                    .with_path(format!("cpu.{}", stat.core)),
                );
            }
        }

        Ok(report)
    }
}
