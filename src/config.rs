use config::{self, File, FileFormat};
use log::{debug, warn};
use serde::Deserialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MetricsdError, Result};

/// Name of the section holding daemon-wide settings
pub const GLOBAL_SECTION: &str = "metricsd";

/// Default collection interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Default bound on a single source's produce call, in seconds
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 20;

/// Default bound on a single sink's send call, in seconds
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the fan-in channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Source of configuration
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path, format chosen by extension
    File(PathBuf),
    /// Environment variables with a prefix
    Environment(String),
    /// TOML string
    Toml(String),
    /// INI string
    Ini(String),
    /// Default configuration
    Defaults,
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    #[default]
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

impl FromStr for LogLevel {
    type Err = MetricsdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" | "fatal" | "panic" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(MetricsdError::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Read-only view over the loaded configuration.
///
/// Keys are looked up as `<section>.<key>`. Every value is read as a string
/// and parsed on demand, so INI files (where everything is a string) and
/// typed formats such as TOML behave the same way.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    inner: config::Config,
}

impl ConfigSnapshot {
    /// A snapshot with no keys at all
    pub fn empty() -> Self {
        Self {
            inner: config::Config::default(),
        }
    }

    /// Look up a raw value
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.inner.get_string(&format!("{}.{}", section, key)).ok()
    }

    /// Look up and parse a value. Unparseable values are logged and treated as missing.
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(section, key)?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid value {:?} for {}.{}: {}", raw, section, key, e);
                None
            }
        }
    }

    /// Look up a boolean value
    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        let raw = self.get(section, key)?;
        match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => {
                warn!("Ignoring invalid boolean {:?} for {}.{}", raw, section, key);
                None
            }
        }
    }

    /// Look up a comma separated list. Entries are trimmed and empty entries dropped.
    pub fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        if let Ok(values) = self.inner.get_array(&format!("{}.{}", section, key)) {
            return Some(
                values
                    .into_iter()
                    .filter_map(|v| v.into_string().ok())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        self.get(section, key).map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    /// Whether the plugin owning `section` is switched on
    pub fn is_enabled(&self, section: &str) -> bool {
        self.get_bool(section, "enabled").unwrap_or(false)
    }
}

impl From<config::Config> for ConfigSnapshot {
    fn from(inner: config::Config) -> Self {
        Self { inner }
    }
}

/// Daemon-wide settings resolved once at startup from the `metricsd` section
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Keep collecting after the first cycle
    pub run_loop: bool,
    /// Time between cycle starts
    pub interval: Duration,
    /// Global hostname override
    pub hostname: Option<String>,
    /// Upper bound on one source's produce call
    pub source_timeout: Duration,
    /// Upper bound on one sink's send call
    pub sink_timeout: Duration,
    /// Capacity of the fan-in channel
    pub channel_capacity: usize,
    /// Logging level
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_loop: false,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            hostname: None,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            sink_timeout: Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from a snapshot, falling back to defaults for anything missing
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let defaults = Settings::default();

        let secs = |key: &str, default: Duration| {
            snapshot
                .get_parsed::<u64>(GLOBAL_SECTION, key)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let settings = Settings {
            run_loop: snapshot.get_bool(GLOBAL_SECTION, "loop").unwrap_or(defaults.run_loop),
            interval: secs("interval", defaults.interval),
            hostname: snapshot
                .get(GLOBAL_SECTION, "hostname")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
            source_timeout: secs("source_timeout", defaults.source_timeout),
            sink_timeout: secs("sink_timeout", defaults.sink_timeout),
            channel_capacity: snapshot
                .get_parsed::<usize>(GLOBAL_SECTION, "channel_capacity")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.channel_capacity),
            log_level: snapshot
                .get_parsed::<LogLevel>(GLOBAL_SECTION, "log_level")
                .unwrap_or(defaults.log_level),
        };

        debug!("Resolved settings: {:?}", settings);
        settings
    }
}

/// Pick a file format from the path's extension
fn file_format(path: &Path) -> Result<FileFormat> {
    let extension = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => {
            return Err(MetricsdError::Config(format!(
                "Configuration file has no extension: {}",
                path.display()
            )));
        }
    };

    match extension.as_str() {
        "ini" | "conf" => Ok(FileFormat::Ini),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        format => Err(MetricsdError::Config(format!(
            "Unsupported config format: {}",
            format
        ))),
    }
}

/// Load a configuration snapshot from the given sources, later sources winning
pub fn load_config(sources: Vec<ConfigSource>) -> Result<ConfigSnapshot> {
    let mut builder = config::Config::builder();

    for source in sources {
        match source {
            ConfigSource::File(path) => {
                if !path.exists() {
                    warn!("Configuration file not found: {}", path.display());
                    continue;
                }

                let format = file_format(&path)?;
                debug!("Loading {:?} configuration from file: {}", format, path.display());
                builder = builder.add_source(File::from(path.as_path()).format(format));
            }
            ConfigSource::Environment(prefix) => {
                debug!("Loading configuration from environment with prefix: {}", prefix);
                builder = builder.add_source(
                    config::Environment::with_prefix(&prefix)
                        .separator("__")
                        .try_parsing(false),
                );
            }
            ConfigSource::Toml(toml_str) => {
                debug!("Loading configuration from TOML string");
                builder = builder.add_source(File::from_str(&toml_str, FileFormat::Toml));
            }
            ConfigSource::Ini(ini_str) => {
                debug!("Loading configuration from INI string");
                builder = builder.add_source(File::from_str(&ini_str, FileFormat::Ini));
            }
            ConfigSource::Defaults => {
                debug!("Using default configuration values");
            }
        }
    }

    let config = builder
        .build()
        .map_err(|e| MetricsdError::Config(format!("Failed to build configuration: {}", e)))?;

    Ok(ConfigSnapshot::from(config))
}

/// Configuration builder
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
}

impl ConfigBuilder {
    /// Create a new config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file source
    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Add environment variables
    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Environment(prefix.into()));
        self
    }

    /// Add TOML string
    pub fn add_toml(mut self, toml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Toml(toml.into()));
        self
    }

    /// Add INI string
    pub fn add_ini(mut self, ini: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Ini(ini.into()));
        self
    }

    /// Use default values
    pub fn use_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Build the snapshot
    pub fn build(self) -> Result<ConfigSnapshot> {
        load_config(self.sources)
    }
}

/// Find a configuration file named `name` with a supported extension in one of `locations`
pub fn find_config_file(name: &str, locations: &[PathBuf]) -> Option<PathBuf> {
    for location in locations {
        for ext in ["ini", "toml", "yaml", "json"] {
            let path = location.join(format!("{}.{}", name, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}

/// Standard configuration search paths
pub fn standard_search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("."),
        PathBuf::from("config"),
        PathBuf::from("/etc/metricsd"),
        PathBuf::from("/etc"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_global_section_missing() {
        let settings = Settings::from_snapshot(&ConfigSnapshot::empty());
        assert_eq!(settings, Settings::default());
        assert!(!settings.run_loop);
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_settings_from_ini_string() {
        let snapshot = ConfigBuilder::new()
            .add_ini(
                r#"
[metricsd]
loop = true
interval = 5
hostname = web-01
log_level = debug
"#,
            )
            .build()
            .unwrap();

        let settings = Settings::from_snapshot(&snapshot);
        assert!(settings.run_loop);
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.hostname.as_deref(), Some("web-01"));
        assert_eq!(settings.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_interval_falls_back_to_default() {
        let snapshot = ConfigBuilder::new()
            .add_toml(
                r#"
                [metricsd]
                interval = "soon"
                "#,
            )
            .build()
            .unwrap();

        let settings = Settings::from_snapshot(&snapshot);
        assert_eq!(settings.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
    }

    #[test]
    fn test_section_lookup_and_lists() {
        let snapshot = ConfigBuilder::new()
            .add_toml(
                r#"
                [diskspace]
                enabled = true
                filesystems = "ext4, xfs ,,btrfs"

                [graphite]
                enabled = false
                port = 2004
                "#,
            )
            .build()
            .unwrap();

        assert!(snapshot.is_enabled("diskspace"));
        assert!(!snapshot.is_enabled("graphite"));
        assert!(!snapshot.is_enabled("vmstat"));
        assert_eq!(snapshot.get_parsed::<u16>("graphite", "port"), Some(2004));
        assert_eq!(
            snapshot.get_list("diskspace", "filesystems").unwrap(),
            vec!["ext4", "xfs", "btrfs"]
        );
        assert_eq!(snapshot.get("graphite", "prefix"), None);
    }

    #[test]
    fn test_later_sources_override_earlier_ones() {
        let snapshot = ConfigBuilder::new()
            .add_toml("[metricsd]\ninterval = 10\nloop = true\n")
            .add_toml("[metricsd]\ninterval = 20\n")
            .build()
            .unwrap();

        let settings = Settings::from_snapshot(&snapshot);
        assert_eq!(settings.interval, Duration::from_secs(20));
        assert!(settings.run_loop);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[metricsd]\nhostname = \"from-file\"").unwrap();

        let snapshot = ConfigBuilder::new().add_file(file.path()).build().unwrap();
        assert_eq!(snapshot.get("metricsd", "hostname").as_deref(), Some("from-file"));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let snapshot = ConfigBuilder::new()
            .add_file("/definitely/not/here/metricsd.ini")
            .build()
            .unwrap();
        assert_eq!(snapshot.get("metricsd", "interval"), None);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        let result = ConfigBuilder::new().add_file(file.path()).build();
        assert!(matches!(result, Err(MetricsdError::Config(_))));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_environment_overrides_file_values() {
        // Prefix unique to this test so parallel tests never see these variables
        unsafe {
            std::env::set_var("MDENVTEST__GRAPHITE__PORT", "2004");
            std::env::set_var("MDENVTEST__METRICSD__LOOP", "true");
        }

        let snapshot = ConfigBuilder::new()
            .add_ini("[graphite]\nport = 2003\n\n[metricsd]\nloop = false\n")
            .add_env("MDENVTEST")
            .build()
            .unwrap();

        assert_eq!(snapshot.get("graphite", "port").as_deref(), Some("2004"));
        assert!(Settings::from_snapshot(&snapshot).run_loop);

        unsafe {
            std::env::remove_var("MDENVTEST__GRAPHITE__PORT");
            std::env::remove_var("MDENVTEST__METRICSD__LOOP");
        }
    }
}
