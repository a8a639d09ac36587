use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::cycle::Pipeline;

/// Runs cycles: one immediately, then one per interval while looping.
///
/// Cycles never overlap. A tick that comes due while a cycle is still
/// running is dropped, and the next cycle waits for the following tick.
pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
    run_loop: bool,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration, run_loop: bool) -> Self {
        Self {
            pipeline,
            interval: interval.max(Duration::from_millis(1)),
            run_loop,
        }
    }

    /// Run until done (single cycle) or until `shutdown` fires.
    ///
    /// `shutdown` is only checked between cycles. `abort` is handed to every
    /// cycle and cuts short whatever source or sink call is in flight.
    /// Returns the number of cycles run.
    pub async fn run(&self, shutdown: &CancellationToken, abort: &CancellationToken) -> u64 {
        let start = Instant::now();
        let mut cycles = 0u64;

        self.pipeline.run_cycle(cycles, &abort.child_token()).await;
        cycles += 1;

        if !self.run_loop {
            return cycles;
        }

        info!("Collecting every {:?}", self.interval);

        let mut ticker = time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = start;

        loop {
            if last_tick.elapsed() > self.interval {
                warn!(
                    "Cycle {} overran the {:?} interval, skipping a tick",
                    cycles - 1,
                    self.interval
                );
                ticker.tick().await;
            }

            last_tick = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested after {} cycles", cycles);
                    break;
                }
                tick = ticker.tick() => tick,
            };

            self.pipeline.run_cycle(cycles, &abort.child_token()).await;
            cycles += 1;
        }

        cycles
    }
}
