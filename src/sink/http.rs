use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinSet;

use crate::config::ConfigSnapshot;
use crate::error::{MetricsdError, Result};
use crate::metric::MetricBatch;
use crate::plugin::Plugin;
use crate::sink::MetricSink;

const NAME: &str = "http";

const DEFAULT_URL: &str = "http://127.0.0.1:8888/udm";

/// Posts the structured form of each metric to an HTTP endpoint, one request per metric
#[derive(Debug)]
pub struct HttpSink {
    enabled: bool,
    url: String,
    debug: bool,
    request_timeout: Duration,
    client: Client,
}

impl Default for HttpSink {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_URL.to_string(),
            debug: false,
            request_timeout: Duration::from_secs(5),
            client: Client::new(),
        }
    }
}

async fn post(client: Client, url: String, body: Vec<u8>, timeout: Duration) -> Result<()> {
    let response = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .timeout(timeout)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(MetricsdError::sink_failed(
            NAME,
            format!("{} answered {}: {}", url, status.as_u16(), text.trim()),
        ));
    }

    Ok(())
}

impl Plugin for HttpSink {
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
        if let Some(url) = config.get(NAME, "url") {
            self.url = url;
        }
        self.debug = config.get_bool(NAME, "debug").unwrap_or(false);
        if let Some(secs) = config.get_parsed::<u64>(NAME, "request_timeout") {
            self.request_timeout = Duration::from_secs(secs.max(1));
        }
    }
}

#[async_trait::async_trait]
impl MetricSink for HttpSink {
    /// Every metric is posted at once, so a slow endpoint cannot starve the
    /// tail of the batch. The batch fails if any post did.
    async fn send(&self, batch: &MetricBatch) -> Result<()> {
        let mut posts = JoinSet::new();

        for metric in batch.iter() {
            let body = match metric.to_json() {
                Ok(body) => body,
                Err(e) => {
                    warn!("[{}] skipping metric {}: {}", NAME, metric.name(), e);
                    continue;
                }
            };
            if self.debug {
                debug!("[{}] POST {} {}", NAME, self.url, String::from_utf8_lossy(&body));
            }
            posts.spawn(post(self.client.clone(), self.url.clone(), body, self.request_timeout));
        }

        let attempted = posts.len();
        let mut failed = 0usize;
        let mut last_error = None;

        while let Some(joined) = posts.join_next().await {
            let outcome = joined.map_err(|e| MetricsdError::sink_failed(NAME, e)).and_then(|r| r);
            if let Err(e) = outcome {
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            None => Ok(()),
            Some(e) => Err(MetricsdError::sink_failed(
                NAME,
                format!("{} of {} posts failed, last: {}", failed, attempted, e),
            )),
        }
    }
}
