use std::fmt;
use std::str::FromStr;

use log::warn;
use tokio::io::AsyncWriteExt;

use crate::config::ConfigSnapshot;
use crate::error::Result;
use crate::metric::{Metric, MetricBatch};
use crate::plugin::Plugin;
use crate::sink::MetricSink;

const NAME: &str = "stdout";

/// How the stdout sink writes each metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plaintext line form
    Line,
    /// One structured JSON object per line
    #[default]
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" | "graphite" => Ok(OutputFormat::Line),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {:?}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Line => f.write_str("line"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Writes every metric to standard output
#[derive(Debug, Default)]
pub struct StdoutSink {
    enabled: bool,
    format: OutputFormat,
    prefix: String,
}

impl StdoutSink {
    fn encode(&self, metric: &Metric) -> Result<String> {
        match self.format {
            OutputFormat::Line => metric.to_line(&self.prefix),
            OutputFormat::Json => Ok(String::from_utf8_lossy(&metric.to_json()?).into_owned()),
        }
    }

    /// The text written for a batch, one newline-terminated entry per encodable metric
    pub fn render(&self, batch: &MetricBatch) -> String {
        let mut out = String::new();
        for metric in batch.iter() {
            match self.encode(metric) {
                Ok(entry) => {
                    out.push_str(&entry);
                    out.push('\n');
                }
                Err(e) => warn!("[{}] skipping metric {}: {}", NAME, metric.name(), e),
            }
        }
        out
    }
}

impl Plugin for StdoutSink {
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
        if let Some(format) = config.get_parsed::<OutputFormat>(NAME, "format") {
            self.format = format;
        }
        if let Some(prefix) = config.get(NAME, "prefix") {
            self.prefix = prefix;
        }
    }
}

#[async_trait::async_trait]
impl MetricSink for StdoutSink {
    async fn send(&self, batch: &MetricBatch) -> Result<()> {
        let out = self.render(batch);
        if out.is_empty() {
            return Ok(());
        }

        let mut stdout = tokio::io::stdout();
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::metric::{HostResolver, MetricKind};
    use chrono::{TimeZone, Utc};

    fn batch() -> MetricBatch {
        let resolver = HostResolver::new("h");
        let metrics = [5.0, f64::INFINITY]
            .into_iter()
            .map(|value| {
                let mut metric = Metric::new(
                    "vmstat",
                    "vmstat",
                    MetricKind::Rate,
                    "swap_in",
                    value,
                    crate::fields! { "unit" => "Page", "name" => "swap_in" },
                )
                .with_timestamp(Utc.timestamp_opt(100, 0).unwrap());
                metric.enrich(&resolver);
                metric
            })
            .collect();
        MetricBatch::new(3, metrics)
    }

    #[test]
    fn test_render_json_by_default() {
        let out = StdoutSink::default().render(&batch());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["name"], "vmstat.swap_in");
        assert_eq!(value["target_type"], "rate");
        assert_eq!(value["unit"], "Page");
    }

    #[test]
    fn test_render_line_format_with_prefix() {
        let snapshot = ConfigBuilder::new()
            .add_ini("[stdout]\nenabled = true\nformat = line\nprefix = test.\n")
            .build()
            .unwrap();

        let mut sink = StdoutSink::default();
        sink.configure(&snapshot);
        assert_eq!(sink.format, OutputFormat::Line);
        assert_eq!(sink.render(&batch()), "test.h.vmstat.swap_in 5 100\n");
    }

    #[test]
    fn test_unknown_format_keeps_default() {
        let snapshot = ConfigBuilder::new()
            .add_ini("[stdout]\nformat = xml\n")
            .build()
            .unwrap();

        let mut sink = StdoutSink::default();
        sink.configure(&snapshot);
        assert_eq!(sink.format, OutputFormat::Json);
    }
}
