//! Cycle machinery: fan-out over sources, fan-in into batches, periodic scheduling

mod config;
mod cycle;
mod dispatch;
mod fanout;
mod periodic;

// Re-export public items
pub use config::{CycleConfig, CycleConfigBuilder};
pub use cycle::{CycleReport, Pipeline};
pub use dispatch::{BATCH_SIZE, BatchDispatcher, DispatchReport};
pub use fanout::{Orchestrator, SourceOutcome, SourceReport};
pub use periodic::Scheduler;
