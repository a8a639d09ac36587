use std::path::PathBuf;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::source::{self, MetricSource};

const NAME: &str = "loadavg";

/// Contents of `/proc/loadavg`
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAvg {
    pub last_1min: f64,
    pub last_5min: f64,
    pub last_15min: f64,
    pub processes_running: u64,
    pub processes_total: u64,
}

/// Parse `/proc/loadavg`, e.g. `0.20 0.18 0.12 1/80 11206`
pub fn parse_loadavg(text: &str) -> Result<LoadAvg> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(MetricsdError::source_failed(NAME, format!("unexpected loadavg line {:?}", text.trim())));
    }

    let load = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|e| MetricsdError::source_failed(NAME, format!("bad load value {:?}: {}", raw, e)))
    };

    let (running, total) = fields[3]
        .split_once('/')
        .ok_or_else(|| MetricsdError::source_failed(NAME, format!("bad process field {:?}", fields[3])))?;

    Ok(LoadAvg {
        last_1min: load(fields[0])?,
        last_5min: load(fields[1])?,
        last_15min: load(fields[2])?,
        processes_running: source::parse_field(NAME, "running", running)?,
        processes_total: source::parse_field(NAME, "total", total)?,
    })
}

/// System load averages and process counts
#[derive(Debug)]
pub struct LoadAvgSource {
    enabled: bool,
    proc_root: PathBuf,
}

impl Default for LoadAvgSource {
    fn default() -> Self {
        Self {
            enabled: false,
            proc_root: PathBuf::from(source::DEFAULT_PROC_ROOT),
        }
    }
}

impl LoadAvgSource {
    fn metrics(stat: &LoadAvg) -> Vec<Metric> {
        let mut report = Vec::with_capacity(5);

        for (name, value) in [
            ("01", stat.last_1min),
            ("05", stat.last_5min),
            ("15", stat.last_15min),
        ] {
            report.push(Metric::new(
                NAME,
                NAME,
                MetricKind::Gauge,
                name,
                value,
                fields! { "unit" => "Load", "name" => name },
            ));
        }

        for (name, value) in [
            ("running", stat.processes_running),
            ("total", stat.processes_total),
        ] {
            report.push(
                Metric::new(
                    NAME,
                    NAME,
                    MetricKind::Gauge,
                    name,
                    value,
                    fields! { "unit" => "Processes", "name" => format!("processes_{}", name) },
                )
                .with_path("loadavg.processes"),
            );
        }

        report
    }
}

impl Plugin for LoadAvgSource {
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
impl MetricSource for LoadAvgSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let text = source::read_proc(NAME, &self.proc_root.join("loadavg")).await?;
        let stat = parse_loadavg(&text)?;
        Ok(Self::metrics(&stat))
    }
}
