//! Windows-specific process control

use std::ffi::c_void;
use std::mem;

use tracing::trace;
use windows::Wdk::Graphics::Direct3D::{
    D3DKMTSetProcessSchedulingPriorityClass, D3DKMT_SCHEDULINGPRIORITYCLASS,
};
use windows::Wdk::System::Threading::{NtSetInformationProcess, PROCESSINFOCLASS};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, FALSE, HANDLE,
    STATUS_ACCESS_DENIED,
};
use windows::Win32::System::Threading::*;

use crate::core::control::{ControlError, ProcessControl, ProcessHandle};
use crate::core::profile::{
    encode_affinity_mask, GpuPriority, IoPriority, PowerThrottlingState, PriorityClass,
};

/// `ProcessIoPriority` in the native process information classes
const PROCESS_IO_PRIORITY: PROCESSINFOCLASS = PROCESSINFOCLASS(33);

/// Win32 process control back-end
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsControl;

impl ProcessControl for WindowsControl {
    type Handle = OwnedProcess;

    fn open(&self, pid: u32) -> Result<OwnedProcess, ControlError> {
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, FALSE, pid) }
            .map_err(|e| classify(pid, "OpenProcess", e))?;
        trace!(pid, "Opened process handle");
        Ok(OwnedProcess { pid, handle })
    }
}

/// Process handle closed on drop
pub struct OwnedProcess {
    pid: u32,
    handle: HANDLE,
}

impl OwnedProcess {
    fn set_information<T>(
        &self,
        op: &'static str,
        class: PROCESS_INFORMATION_CLASS,
        value: &T,
    ) -> Result<(), ControlError> {
        unsafe {
            SetProcessInformation(
                self.handle,
                class,
                value as *const T as *const c_void,
                mem::size_of::<T>() as u32,
            )
        }
        .map_err(|e| classify(self.pid, op, e))
    }
}

impl ProcessHandle for OwnedProcess {
    fn set_priority_class(&self, class: PriorityClass) -> Result<(), ControlError> {
        let priority_class = match class {
            PriorityClass::Idle => IDLE_PRIORITY_CLASS,
            PriorityClass::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
            PriorityClass::Normal => NORMAL_PRIORITY_CLASS,
            PriorityClass::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
            PriorityClass::High => HIGH_PRIORITY_CLASS,
        };

        unsafe { SetPriorityClass(self.handle, priority_class) }
            .map_err(|e| classify(self.pid, "SetPriorityClass", e))
    }

    fn set_affinity(&self, cores: &[usize]) -> Result<(), ControlError> {
        let mask = encode_affinity_mask(cores);
        if mask == 0 {
            return Err(ControlError::Unsupported("affinity beyond the native mask width"));
        }

        unsafe { SetProcessAffinityMask(self.handle, mask) }
            .map_err(|e| classify(self.pid, "SetProcessAffinityMask", e))
    }

    fn set_io_priority(&self, priority: IoPriority) -> Result<(), ControlError> {
        let value: u32 = priority.raw();
        unsafe {
            NtSetInformationProcess(
                self.handle,
                PROCESS_IO_PRIORITY,
                &value as *const u32 as *const c_void,
                mem::size_of::<u32>() as u32,
            )
        }
        .ok()
        .map_err(|e| classify(self.pid, "NtSetInformationProcess(ProcessIoPriority)", e))
    }

    fn set_gpu_priority(&self, priority: GpuPriority) -> Result<(), ControlError> {
        let class = D3DKMT_SCHEDULINGPRIORITYCLASS(priority.raw() as i32);
        unsafe { D3DKMTSetProcessSchedulingPriorityClass(self.handle, class) }
            .ok()
            .map_err(|e| classify(self.pid, "D3DKMTSetProcessSchedulingPriorityClass", e))
    }

    fn set_power_throttling(&self, state: PowerThrottlingState) -> Result<(), ControlError> {
        let request = PROCESS_POWER_THROTTLING_STATE {
            Version: state.version,
            ControlMask: state.control_mask,
            StateMask: state.state_mask,
        };
        self.set_information(
            "SetProcessInformation(ProcessPowerThrottling)",
            ProcessPowerThrottling,
            &request,
        )
    }
}

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
        trace!(pid = self.pid, "Closed process handle");
    }
}

/// Map a Win32 or NT failure onto the control error taxonomy
fn classify(pid: u32, op: &'static str, err: windows::core::Error) -> ControlError {
    let code = err.code();
    if code == ERROR_ACCESS_DENIED.to_hresult() || code == STATUS_ACCESS_DENIED.to_hresult() {
        ControlError::AccessDenied(pid)
    } else if op == "OpenProcess" && code == ERROR_INVALID_PARAMETER.to_hresult() {
        // OpenProcess reports an unknown pid as an invalid parameter
        ControlError::NoSuchProcess(pid)
    } else {
        ControlError::Os {
            op,
            pid,
            source: std::io::Error::from(err),
        }
    }
}
