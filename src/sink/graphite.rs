use std::time::Duration;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::metric::MetricBatch;
use crate::plugin::Plugin;
use crate::sink::MetricSink;

const NAME: &str = "graphite";

/// Pushes the line form of every metric to a graphite plaintext listener
#[derive(Debug)]
pub struct GraphiteSink {
    enabled: bool,
    host: String,
    port: u16,
    prefix: String,
    connect_timeout: Duration,
}

impl Default for GraphiteSink {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 2003,
            prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl GraphiteSink {
    /// Newline-terminated lines for the batch; unencodable metrics are skipped
    fn render(&self, batch: &MetricBatch) -> String {
        let mut payload = String::new();
        for metric in batch.iter() {
            match metric.to_line(&self.prefix) {
                Ok(line) => {
                    payload.push_str(&line);
                    payload.push('\n');
                }
                Err(e) => warn!("[{}] skipping metric {}: {}", NAME, metric.name(), e),
            }
        }
        payload
    }
}

impl Plugin for GraphiteSink {
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
        if let Some(host) = config.get(NAME, "host") {
            self.host = host;
        }
        if let Some(port) = config.get_parsed::<u16>(NAME, "port") {
            self.port = port;
        }
        if let Some(prefix) = config.get(NAME, "prefix") {
            self.prefix = prefix;
        }
        if let Some(secs) = config.get_parsed::<u64>(NAME, "connect_timeout") {
            self.connect_timeout = Duration::from_secs(secs.max(1));
        }
    }
}

#[async_trait::async_trait]
impl MetricSink for GraphiteSink {
    async fn send(&self, batch: &MetricBatch) -> Result<()> {
        let payload = self.render(batch);
        if payload.is_empty() {
            return Ok(());
        }

        let address = (self.host.as_str(), self.port);
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(MetricsdError::sink_failed(
                    NAME,
                    format!("connecting to {}:{}: {}", self.host, self.port, e),
                ));
            }
            Err(_) => {
                return Err(MetricsdError::Timeout(
                    format!("connecting to {}:{}", self.host, self.port),
                    self.connect_timeout,
                ));
            }
        };

        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await?;

        debug!("[{}] shipped {} bytes to {}:{}", NAME, payload.len(), self.host, self.port);
        Ok(())
    }
}
