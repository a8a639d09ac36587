use std::path::PathBuf;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::source::{self, MetricSource};

const NAME: &str = "vmstat";

/// `/proc/vmstat` keys we report, and the metric name for each
const REPORTED: [(&str, &str); 4] = [
    ("pgpgin", "paging_in"),
    ("pgpgout", "paging_out"),
    ("pswpin", "swap_in"),
    ("pswpout", "swap_out"),
];

/// Parse the reported counters out of `/proc/vmstat`, in reporting order
pub fn parse_vmstat(text: &str) -> Result<Vec<(&'static str, u64)>> {
    let mut found = Vec::with_capacity(REPORTED.len());

    for (key, metric_name) in REPORTED {
        let raw = text
            .lines()
            .filter_map(|line| line.split_once(' '))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.trim())
            .ok_or_else(|| MetricsdError::source_failed(NAME, format!("missing {} in vmstat", key)))?;

        found.push((metric_name, source::parse_field(NAME, key, raw)?));
    }

    Ok(found)
}

/// Paging and swapping activity
#[derive(Debug)]
pub struct VmstatSource {
    enabled: bool,
    proc_root: PathBuf,
}

impl Default for VmstatSource {
    fn default() -> Self {
        Self {
            enabled: false,
            proc_root: PathBuf::from(source::DEFAULT_PROC_ROOT),
        }
    }
}

impl Plugin for VmstatSource {
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
impl MetricSource for VmstatSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let text = source::read_proc(NAME, &self.proc_root.join("vmstat")).await?;

        Ok(parse_vmstat(&text)?
            .into_iter()
            .map(|(name, value)| {
                Metric::new(
                    NAME,
                    NAME,
                    MetricKind::Rate,
                    name,
                    value,
                    fields! { "unit" => "Page", "name" => name },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VMSTAT: &str = "nr_free_pages 123\npgpgin 1000\npgpgout 2000\npswpin 3\npswpout 4\npgfault 99\n";

    #[test]
    fn test_parse_vmstat() {
        assert_eq!(
            parse_vmstat(VMSTAT).unwrap(),
            vec![("paging_in", 1000), ("paging_out", 2000), ("swap_in", 3), ("swap_out", 4)]
        );
    }

    #[test]
    fn test_missing_key_is_an_error() {
        assert!(parse_vmstat("pgpgin 1\n").is_err());
    }

    #[tokio::test]
    async fn test_produce_reports_rates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vmstat"), VMSTAT).unwrap();

        let source = VmstatSource {
            enabled: true,
            proc_root: dir.path().to_path_buf(),
        };
        let metrics = source.produce().await.unwrap();
        assert_eq!(metrics.len(), 4);
        assert!(metrics.iter().all(|m| m.metric_type() == MetricKind::Rate));
        assert_eq!(metrics[1].name(), "paging_out");
    }
}
