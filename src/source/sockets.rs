use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::fields;
use crate::metric::{Metric, MetricKind};
use crate::plugin::Plugin;
use crate::source::{self, MetricSource};

const NAME: &str = "sockets";

/// (sockstat section, field, reported key)
const REPORTED: [(&str, &str, &str); 8] = [
    ("TCP", "alloc", "tcp_alloc"),
    ("TCP", "inuse", "tcp_inuse"),
    ("TCP", "mem", "tcp_mem"),
    ("TCP", "orphan", "tcp_orphan"),
    ("TCP", "tw", "tcp_tw"),
    ("UDP", "inuse", "udp_inuse"),
    ("UDP", "mem", "udp_mem"),
    ("sockets", "used", "used"),
];

/// Parse `/proc/net/sockstat` into `(key, value)` pairs in reporting order.
///
/// Lines look like `TCP: inuse 5 orphan 0 tw 2 alloc 7 mem 1`.
pub fn parse_sockstat(text: &str) -> Result<Vec<(&'static str, u64)>> {
    let mut sections: HashMap<&str, HashMap<&str, &str>> = HashMap::new();

    for line in text.lines() {
        let Some((section, rest)) = line.split_once(':') else {
            continue;
        };
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let pairs = tokens.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
        sections.insert(section.trim(), pairs);
    }

    REPORTED
        .iter()
        .map(|(section, field, key)| {
            let raw = sections
                .get(section)
                .and_then(|fields| fields.get(field))
                .ok_or_else(|| {
                    MetricsdError::source_failed(NAME, format!("missing {} {} in sockstat", section, field))
                })?;
            Ok((*key, source::parse_field(NAME, key, raw)?))
        })
        .collect()
}

/// Socket usage counts
#[derive(Debug)]
pub struct SocketsSource {
    enabled: bool,
    proc_root: PathBuf,
}

impl Default for SocketsSource {
    fn default() -> Self {
        Self {
            enabled: false,
            proc_root: PathBuf::from(source::DEFAULT_PROC_ROOT),
        }
    }
}

impl SocketsSource {
    fn metric(key: &str, value: u64) -> Metric {
        let mut data = fields! { "unit" => "Sock", "name" => key };

        let metric_name = match key.split_once('_') {
            Some((protocol, name)) => {
                data.insert("protocol".to_string(), protocol.into());
                name
            }
            None => key,
        };

        Metric::new(NAME, NAME, MetricKind::Gauge, metric_name, value, data)
    }
}

impl Plugin for SocketsSource {
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
impl MetricSource for SocketsSource {
    async fn produce(&self) -> Result<Vec<Metric>> {
        let text = source::read_proc(NAME, &self.proc_root.join("net").join("sockstat")).await?;

        Ok(parse_sockstat(&text)?
            .into_iter()
            .map(|(key, value)| Self::metric(key, value))
            .collect())
    }
}
