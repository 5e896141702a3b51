//! Process control port - The OS operations the applier needs, one fallible call each

use thiserror::Error;

use super::profile::{GpuPriority, IoPriority, PowerThrottlingState, PriorityClass};

/// Failure of a single process-control operation
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("process {0} does not exist")]
    NoSuchProcess(u32),

    #[error("access denied to process {0}")]
    AccessDenied(u32),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("{op} failed for process {pid}: {source}")]
    Os {
        op: &'static str,
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Opens processes for attribute changes
pub trait ProcessControl {
    type Handle: ProcessHandle;

    /// Open `pid` with full access. The returned handle releases itself on drop.
    fn open(&self, pid: u32) -> Result<Self::Handle, ControlError>;
}

/// Scoped access to one open process
pub trait ProcessHandle {
    fn set_priority_class(&self, class: PriorityClass) -> Result<(), ControlError>;

    /// Restrict the process to exactly `cores`
    fn set_affinity(&self, cores: &[usize]) -> Result<(), ControlError>;

    fn set_io_priority(&self, priority: IoPriority) -> Result<(), ControlError>;

    fn set_gpu_priority(&self, priority: GpuPriority) -> Result<(), ControlError>;

    fn set_power_throttling(&self, state: PowerThrottlingState) -> Result<(), ControlError>;
}
