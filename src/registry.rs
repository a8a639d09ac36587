//! The plugins this daemon knows about, and turning configuration into the enabled set

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::ConfigSnapshot;
use crate::plugin::Plugin;
use crate::sink::{GraphiteSink, LogSink, MetricSink, StdoutSink};
use crate::source::{
    CpuSource, DiskspaceSource, IostatSource, LoadAvgSource, MetricSource, SocketsSource, VmstatSource,
};

/// Every source, in the order they are started
pub fn known_sources() -> Vec<Box<dyn MetricSource>> {
    vec![
        Box::new(CpuSource::default()),
        Box::new(DiskspaceSource::default()),
        Box::new(IostatSource::default()),
        Box::new(LoadAvgSource::default()),
        Box::new(SocketsSource::default()),
        Box::new(VmstatSource::default()),
    ]
}

/// Every sink, in delivery order
pub fn known_sinks() -> Vec<Box<dyn MetricSink>> {
    let mut sinks: Vec<Box<dyn MetricSink>> = vec![Box::new(GraphiteSink::default())];
    #[cfg(feature = "http-sink")]
    sinks.push(Box::new(crate::sink::HttpSink::default()));
    sinks.push(Box::new(StdoutSink::default()));
    sinks.push(Box::new(LogSink::default()));
    sinks
}

/// Switch on and configure the plugins whose section says `enabled = true`,
/// dropping the rest
fn enable<P: ?Sized + Plugin>(plugins: Vec<Box<P>>, config: &ConfigSnapshot) -> Vec<Arc<P>> {
    plugins
        .into_iter()
        .filter_map(|mut plugin| {
            if !config.is_enabled(plugin.name()) {
                debug!("{} is disabled", plugin.name());
                return None;
            }
            plugin.set_enabled(true);
            plugin.configure(config);
            info!("Enabled {}", plugin.name());
            Some(Arc::from(plugin))
        })
        .collect()
}

/// Enabled sources, configured
pub fn build_sources(config: &ConfigSnapshot) -> Vec<Arc<dyn MetricSource>> {
    let sources = enable(known_sources(), config);
    if sources.is_empty() {
        warn!("No sources enabled; cycles will produce nothing");
    }
    sources
}

/// Enabled sinks, configured, in delivery order
pub fn build_sinks(config: &ConfigSnapshot) -> Vec<Arc<dyn MetricSink>> {
    let sinks = enable(known_sinks(), config);
    if sinks.is_empty() {
        warn!("No sinks enabled; collected metrics will be discarded");
    }
    sinks
}
