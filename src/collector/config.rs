use std::time::Duration;

use crate::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_SINK_TIMEOUT_SECS, DEFAULT_SOURCE_TIMEOUT_SECS, Settings};

/// Limits applied to every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    /// Capacity of the fan-in channel between source workers and the dispatcher
    pub channel_capacity: usize,
    /// Upper bound on one source's produce call
    pub source_timeout: Duration,
    /// Upper bound on one sink's send call
    pub sink_timeout: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            sink_timeout: Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS),
        }
    }
}

impl From<&Settings> for CycleConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            channel_capacity: settings.channel_capacity,
            source_timeout: settings.source_timeout,
            sink_timeout: settings.sink_timeout,
        }
    }
}

/// Builder for cycle configuration
#[derive(Debug, Default)]
pub struct CycleConfigBuilder {
    config: CycleConfig,
}

impl CycleConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fan-in channel capacity. Zero is bumped to one.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.config.source_timeout = timeout;
        self
    }

    pub fn sink_timeout(mut self, timeout: Duration) -> Self {
        self.config.sink_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CycleConfig {
        self.config
    }
}
