use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use metricsd::collector::{CycleConfig, Pipeline, Scheduler};
use metricsd::config::{self, ConfigSource, LogLevel, Settings};
use metricsd::metric::HostResolver;
use metricsd::plugin::Plugin;
use metricsd::{registry, util};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "metricsd", version, about = "Collects host metrics and ships them in batches")]
struct Args {
    /// Configuration file (ini, toml, yaml or json). Searched for in ., config/ and /etc when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle, whatever `loop` says
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = match args.config {
        Some(path) if !path.exists() => bail!("Configuration file not found: {}", path.display()),
        Some(path) => Some(path),
        None => config::find_config_file("metricsd", &config::standard_search_paths()),
    };

    let mut sources = vec![ConfigSource::Defaults];
    if let Some(path) = &config_file {
        sources.push(ConfigSource::File(path.clone()));
    }
    sources.push(ConfigSource::Environment("METRICSD".to_string()));

    let snapshot = config::load_config(sources).context("Failed to load configuration")?;
    let mut settings = Settings::from_snapshot(&snapshot);
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    if args.once {
        settings.run_loop = false;
    }

    util::logging::init(&settings.log_level);
    match &config_file {
        Some(path) => info!("metricsd {} using {}", metricsd::VERSION, path.display()),
        None => warn!("metricsd {} found no configuration file, running on defaults", metricsd::VERSION),
    }

    let sources = registry::build_sources(&snapshot);
    let sinks = registry::build_sinks(&snapshot);
    let resolver = HostResolver::from_config(&snapshot, &settings, sources.iter().map(|s| s.name()));

    let pipeline = Pipeline::new(sources, sinks, resolver, CycleConfig::from(&settings));
    let scheduler = Scheduler::new(pipeline, settings.interval, settings.run_loop);

    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone(), abort.clone()));

    let cycles = scheduler.run(&shutdown, &abort).await;
    info!("Stopped after {} cycles", cycles);

    Ok(())
}

/// First ctrl-c stops after the running cycle, a second one cuts it short
async fn watch_signals(shutdown: CancellationToken, abort: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Cannot listen for ctrl-c; stop the process with a signal instead");
        return;
    }
    info!("Shutting down after the current cycle (ctrl-c again to abort it)");
    shutdown.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Aborting the current cycle");
        abort.cancel();
    }
}
