// src/error.rs
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the daemon
pub type Result<T> = std::result::Result<T, MetricsdError>;

/// Error type for the metrics daemon
#[derive(Error, Debug)]
pub enum MetricsdError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Source error ({source_name}): {reason}")]
    Source { source_name: String, reason: String },

    #[error("Sink error ({sink}): {reason}")]
    Sink { sink: String, reason: String },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Process error: {0}")]
    Process(String),

    #[cfg(feature = "http-sink")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MetricsdError {
    /// Build a source error for the named source
    pub fn source_failed(name: impl Into<String>, reason: impl ToString) -> Self {
        MetricsdError::Source {
            source_name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a sink error for the named sink
    pub fn sink_failed(name: impl Into<String>, reason: impl ToString) -> Self {
        MetricsdError::Sink {
            sink: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for MetricsdError {
    fn from(err: config::ConfigError) -> Self {
        MetricsdError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MetricsdError {
    fn from(err: serde_json::Error) -> Self {
        MetricsdError::Encode(err.to_string())
    }
}
