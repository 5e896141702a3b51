//! Attribute application - Apply the demotion profile to a single process

use tracing::{debug, trace};

use super::control::{ControlError, ProcessControl, ProcessHandle};
use super::profile::AttributeProfile;

/// Result of one attribute step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepOutcome {
    /// The step was not attempted
    #[default]
    Skipped,
    Applied,
    Failed,
}

impl StepOutcome {
    fn from_result(pid: u32, step: &'static str, result: Result<(), ControlError>) -> Self {
        match result {
            Ok(()) => {
                trace!(pid, step, "Attribute applied");
                Self::Applied
            }
            Err(e) => {
                debug!(pid, step, error = %e, "Attribute step failed");
                Self::Failed
            }
        }
    }
}

/// What happened while applying the profile to one process.
///
/// Callers are free to ignore it; `apply` never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub pid: u32,
    /// False when the process could not be opened; no step was attempted then
    pub opened: bool,
    pub priority: StepOutcome,
    pub affinity: StepOutcome,
    pub io_priority: StepOutcome,
    pub gpu_priority: StepOutcome,
    pub power_throttling: StepOutcome,
}

impl ApplyReport {
    fn steps(&self) -> [StepOutcome; 5] {
        [
            self.priority,
            self.affinity,
            self.io_priority,
            self.gpu_priority,
            self.power_throttling,
        ]
    }

    pub fn applied_count(&self) -> usize {
        self.steps()
            .iter()
            .filter(|s| **s == StepOutcome::Applied)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.steps()
            .iter()
            .filter(|s| **s == StepOutcome::Failed)
            .count()
    }
}

/// Applies an [`AttributeProfile`] to processes through a [`ProcessControl`] back-end
pub struct AttributeApplier<C> {
    control: C,
    profile: AttributeProfile,
}

impl<C: ProcessControl> AttributeApplier<C> {
    pub fn new(control: C, profile: AttributeProfile) -> Self {
        Self { control, profile }
    }

    /// Apply every attribute of the profile to `pid`, best effort.
    ///
    /// Each step is attempted regardless of the others. The process handle is
    /// dropped before returning on every path.
    pub fn apply(&self, pid: u32) -> ApplyReport {
        let mut report = ApplyReport {
            pid,
            ..Default::default()
        };

        let handle = match self.control.open(pid) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(pid, error = %e, "Could not open process, skipping");
                return report;
            }
        };
        report.opened = true;

        report.priority = StepOutcome::from_result(
            pid,
            "priority",
            handle.set_priority_class(self.profile.priority_class),
        );

        let cores = self.profile.core_list();
        if !cores.is_empty() {
            report.affinity =
                StepOutcome::from_result(pid, "affinity", handle.set_affinity(&cores));
        }

        report.io_priority = StepOutcome::from_result(
            pid,
            "io_priority",
            handle.set_io_priority(self.profile.io_priority),
        );

        report.gpu_priority = StepOutcome::from_result(
            pid,
            "gpu_priority",
            handle.set_gpu_priority(self.profile.gpu_priority),
        );

        if let Some(state) = self.profile.power_throttling_state() {
            report.power_throttling = StepOutcome::from_result(
                pid,
                "power_throttling",
                handle.set_power_throttling(state),
            );
        }

        drop(handle);
        report
    }
}
