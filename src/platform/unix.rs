//! Unix process control
//!
//! Maps the profile onto nice values, `sched_setaffinity` and `ioprio_set` where
//! the kernel offers them. GPU priority and power throttling have no Unix
//! counterpart and report `Unsupported`.

use std::io;

use crate::core::control::{ControlError, ProcessControl, ProcessHandle};
use crate::core::profile::{GpuPriority, IoPriority, PowerThrottlingState, PriorityClass};

#[derive(Debug, Default, Clone, Copy)]
pub struct UnixControl;

impl ProcessControl for UnixControl {
    type Handle = UnixProcess;

    fn open(&self, pid: u32) -> Result<UnixProcess, ControlError> {
        let raw = libc::pid_t::try_from(pid).map_err(|_| ControlError::NoSuchProcess(pid))?;
        if raw <= 0 {
            return Err(ControlError::NoSuchProcess(pid));
        }

        // Signal 0 checks existence and permission without delivering anything
        let result = unsafe { libc::kill(raw, 0) };
        if result == 0 {
            Ok(UnixProcess { pid, raw })
        } else {
            Err(classify(pid, "kill", io::Error::last_os_error()))
        }
    }
}

/// A process addressed by pid; Unix has no handle to release
pub struct UnixProcess {
    pid: u32,
    raw: libc::pid_t,
}

impl ProcessHandle for UnixProcess {
    fn set_priority_class(&self, class: PriorityClass) -> Result<(), ControlError> {
        let who = self.raw as libc::id_t;
        let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, who, class.nice_value()) };
        if result == 0 {
            Ok(())
        } else {
            Err(classify(self.pid, "setpriority", io::Error::last_os_error()))
        }
    }

    #[cfg(target_os = "linux")]
    fn set_affinity(&self, cores: &[usize]) -> Result<(), ControlError> {
        let max_cores = 8 * std::mem::size_of::<libc::cpu_set_t>();

        let result = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            for &core in cores.iter().filter(|&&core| core < max_cores) {
                libc::CPU_SET(core, &mut set);
            }
            libc::sched_setaffinity(self.raw, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };

        if result == 0 {
            Ok(())
        } else {
            Err(classify(self.pid, "sched_setaffinity", io::Error::last_os_error()))
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn set_affinity(&self, _cores: &[usize]) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("CPU affinity"))
    }

    #[cfg(target_os = "linux")]
    fn set_io_priority(&self, priority: IoPriority) -> Result<(), ControlError> {
        let result = unsafe {
            libc::syscall(
                libc::SYS_ioprio_set,
                IOPRIO_WHO_PROCESS,
                self.raw,
                ioprio_value(priority),
            )
        };

        if result == 0 {
            Ok(())
        } else {
            Err(classify(self.pid, "ioprio_set", io::Error::last_os_error()))
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn set_io_priority(&self, _priority: IoPriority) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("I/O priority"))
    }

    fn set_gpu_priority(&self, _priority: GpuPriority) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("GPU priority"))
    }

    fn set_power_throttling(&self, _state: PowerThrottlingState) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("power throttling"))
    }
}

#[cfg(target_os = "linux")]
const IOPRIO_WHO_PROCESS: libc::c_int = 1;
#[cfg(target_os = "linux")]
const IOPRIO_CLASS_SHIFT: u32 = 13;
#[cfg(target_os = "linux")]
const IOPRIO_CLASS_BE: u32 = 2;
#[cfg(target_os = "linux")]
const IOPRIO_CLASS_IDLE: u32 = 3;

/// Encode an I/O priority the way `ioprio_set` expects it
#[cfg(target_os = "linux")]
pub fn ioprio_value(priority: IoPriority) -> libc::c_int {
    let (class, level) = match priority {
        IoPriority::VeryLow => (IOPRIO_CLASS_IDLE, 0),
        IoPriority::Low => (IOPRIO_CLASS_BE, 7),
        IoPriority::Normal => (IOPRIO_CLASS_BE, 4),
    };
    ((class << IOPRIO_CLASS_SHIFT) | level) as libc::c_int
}

fn classify(pid: u32, op: &'static str, err: io::Error) -> ControlError {
    match err.raw_os_error() {
        Some(libc::ESRCH) => ControlError::NoSuchProcess(pid),
        Some(libc::EPERM) | Some(libc::EACCES) => ControlError::AccessDenied(pid),
        _ => ControlError::Os {
            op,
            pid,
            source: err,
        },
    }
}
