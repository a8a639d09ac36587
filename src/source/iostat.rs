use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::source::{self, MetricSource};

const NAME: &str = "iostat";

/// Physical disks, md arrays and device-mapper volumes. nvme partitions are not matched.
const DEVICE_PATTERN: &str =
    r"^(PhysicalDrive[0-9]+|md[0-9]+|sd[a-z]+[0-9]*|x?vd[a-z]+[0-9]*|disk[0-9]+|dm-[0-9]+|nvme[0-9]+n[0-9]+)$";

fn device_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(DEVICE_PATTERN))
        .as_ref()
        .map_err(|e| MetricsdError::source_failed(NAME, e))
}

/// Counters for one block device from `/proc/diskstats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskStat {
    pub device: String,
    pub reads: u64,
    pub reads_merged: u64,
    pub writes: u64,
    pub writes_merged: u64,
}

impl DiskStat {
    fn values(&self) -> [(&'static str, u64); 5] {
        [
            ("io", self.reads.wrapping_add(self.writes)),
            ("reads", self.reads),
            ("reads_merged", self.reads_merged),
            ("writes", self.writes),
            ("writes_merged", self.writes_merged),
        ]
    }
}

/// Parse `/proc/diskstats`, keeping only devices that match the device pattern
pub fn parse_diskstats(text: &str) -> Result<Vec<DiskStat>> {
    let pattern = device_pattern()?;
    let mut stats = Vec::new();

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }

        let device = fields[2];
        if !pattern.is_match(device) {
            continue;
        }

        stats.push(DiskStat {
            device: device.to_string(),
            reads: source::parse_field(NAME, "reads", fields[3])?,
            reads_merged: source::parse_field(NAME, "reads_merged", fields[4])?,
            writes: source::parse_field(NAME, "writes", fields[7])?,
            writes_merged: source::parse_field(NAME, "writes_merged", fields[8])?,
        });
    }

    Ok(stats)
}

/// Block device I/O counters
#[derive(Debug)]
pub struct IostatSource {
    enabled: bool,
    proc_root: PathBuf,
}

impl Default for IostatSource {
    fn default() -> Self {
        Self {
            enabled: false,
            proc_root: PathBuf::from(source::DEFAULT_PROC_ROOT),
        }
    }
}

impl Plugin for IostatSource {
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
    }
}

#[async_trait::async_trait]
impl MetricSource for IostatSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let text = source::read_proc(NAME, &self.proc_root.join("diskstats")).await?;
        let stats = parse_diskstats(&text)?;

        let mut report = Vec::with_capacity(stats.len() * 5);
        for stat in &stats {
            for (name, value) in stat.values() {
                report.push(
                    Metric::new(
                        NAME,
                        NAME,
                        MetricKind::Gauge,
                        name,
                        value,
                        fields! { "device" => stat.device.as_str(), "unit" => "IO", "name" => name },
                    )
                    .with_path(format!("iostat.{}", stat.device)),
                );
            }
        }

        if report.is_empty() {
            return Err(MetricsdError::source_failed(NAME, "no block devices found"));
        }

        Ok(report)
    }
}
