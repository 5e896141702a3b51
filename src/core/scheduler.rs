//! Monitor scheduler - Scan, apply, wait, repeat until cancelled

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::applier::AttributeApplier;
use super::control::ProcessControl;
use super::scanner::{ProcessScanner, ProcessSource, ScanError};

/// Counts for a single scan-and-apply cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub matched: usize,
    pub opened: usize,
    pub applied_steps: usize,
    pub failed_steps: usize,
}

/// Totals over the lifetime of one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub matched: u64,
    pub opened: u64,
}

impl RunSummary {
    fn record(&mut self, stats: CycleStats) {
        self.matched += stats.matched as u64;
        self.opened += stats.opened as u64;
    }
}

pub struct MonitorScheduler<S, C> {
    scanner: ProcessScanner<S>,
    applier: AttributeApplier<C>,
    interval: Duration,
}

impl<S: ProcessSource, C: ProcessControl> MonitorScheduler<S, C> {
    pub fn new(
        scanner: ProcessScanner<S>,
        applier: AttributeApplier<C>,
        interval: Duration,
    ) -> Self {
        Self {
            scanner,
            applier,
            interval,
        }
    }

    /// One scan followed by an apply for every match
    pub fn run_cycle(&mut self) -> Result<CycleStats, ScanError> {
        let mut stats = CycleStats::default();

        for entry in self.scanner.scan()? {
            stats.matched += 1;
            let report = self.applier.apply(entry.pid);
            if report.opened {
                stats.opened += 1;
            }
            stats.applied_steps += report.applied_count();
            stats.failed_steps += report.failed_count();
        }

        Ok(stats)
    }

    /// Run cycles until `cancel` fires.
    ///
    /// A failing or panicking cycle is logged and the loop carries on after the
    /// normal wait. Cancellation interrupts the wait immediately.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        info!(
            prefix = self.scanner.criterion().prefix(),
            interval_secs = self.interval.as_secs_f64(),
            "Process monitor started"
        );

        let mut summary = RunSummary::default();

        loop {
            summary.cycles += 1;

            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(stats)) => {
                    debug!(
                        cycle = summary.cycles,
                        matched = stats.matched,
                        opened = stats.opened,
                        applied_steps = stats.applied_steps,
                        failed_steps = stats.failed_steps,
                        "Cycle complete"
                    );
                    summary.record(stats);
                }
                Ok(Err(e)) => {
                    summary.failed_cycles += 1;
                    warn!(cycle = summary.cycles, error = %e, "Cycle failed");
                }
                Err(_) => {
                    summary.failed_cycles += 1;
                    warn!(cycle = summary.cycles, "Cycle panicked");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Process monitor received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            "Process monitor stopped"
        );
        summary
    }
}
