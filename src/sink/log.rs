use log::{info, warn};

use crate::config::ConfigSnapshot;
use crate::error::Result;
use crate::metric::MetricBatch;
use crate::plugin::Plugin;
use crate::sink::MetricSink;

const NAME: &str = "log";

/// Logs the line form of every metric at info level. Handy for dry runs.
#[derive(Debug, Default)]
pub struct LogSink {
    enabled: bool,
    prefix: String,
}

impl Plugin for LogSink {
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
        if let Some(prefix) = config.get(NAME, "prefix") {
            self.prefix = prefix;
        }
    }
}

#[async_trait::async_trait]
impl MetricSink for LogSink {
    async fn send(&self, batch: &MetricBatch) -> Result<()> {
        for metric in batch.iter() {
            match metric.to_line(&self.prefix) {
                Ok(line) => info!("[batch {}] {}", batch.sequence, line),
                Err(e) => warn!("[{}] skipping metric {}: {}", NAME, metric.name(), e),
            }
        }
        Ok(())
    }
}
