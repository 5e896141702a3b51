//! In-memory process table and control back-end for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::control::{ControlError, ProcessControl, ProcessHandle};
use super::profile::{GpuPriority, IoPriority, PowerThrottlingState, PriorityClass};
use super::scanner::{ProcessEntry, ProcessSource, ScanError};

/// Attributes recorded for one fake process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeAttributes {
    pub priority: Option<PriorityClass>,
    pub affinity: Option<Vec<usize>>,
    pub io_priority: Option<IoPriority>,
    pub gpu_priority: Option<GpuPriority>,
    pub power_throttling: Option<PowerThrottlingState>,
}

#[derive(Default)]
struct FakeState {
    live: HashMap<u32, FakeAttributes>,
    denied: HashSet<u32>,
    exit_after_open: HashSet<u32>,
    failing_ops: HashSet<&'static str>,
    open_handles: usize,
    opened: Vec<u32>,
}

#[derive(Clone, Default)]
pub struct FakeControl {
    state: Arc<Mutex<FakeState>>,
}

impl FakeControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(self, pid: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .live
            .insert(pid, FakeAttributes::default());
        self
    }

    pub fn deny(self, pid: u32) -> Self {
        self.state.lock().unwrap().denied.insert(pid);
        self
    }

    /// The process disappears right after it has been opened
    pub fn exit_after_open(self, pid: u32) -> Self {
        self.state.lock().unwrap().exit_after_open.insert(pid);
        self
    }

    pub fn fail_op(self, op: &'static str) -> Self {
        self.state.lock().unwrap().failing_ops.insert(op);
        self
    }

    pub fn set_existing_affinity(&self, pid: u32, cores: Vec<usize>) {
        if let Some(attrs) = self.state.lock().unwrap().live.get_mut(&pid) {
            attrs.affinity = Some(cores);
        }
    }

    pub fn attributes(&self, pid: u32) -> Option<FakeAttributes> {
        self.state.lock().unwrap().live.get(&pid).cloned()
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles
    }

    /// Pids successfully opened, in order
    pub fn opened(&self) -> Vec<u32> {
        self.state.lock().unwrap().opened.clone()
    }
}

impl ProcessControl for FakeControl {
    type Handle = FakeHandle;

    fn open(&self, pid: u32) -> Result<FakeHandle, ControlError> {
        let mut state = self.state.lock().unwrap();
        if !state.live.contains_key(&pid) {
            return Err(ControlError::NoSuchProcess(pid));
        }
        if state.denied.contains(&pid) {
            return Err(ControlError::AccessDenied(pid));
        }
        if state.exit_after_open.contains(&pid) {
            state.live.remove(&pid);
        }
        state.open_handles += 1;
        state.opened.push(pid);

        Ok(FakeHandle {
            pid,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeHandle {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
}

impl FakeHandle {
    fn update(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut FakeAttributes),
    ) -> Result<(), ControlError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_ops.contains(op) {
            return Err(ControlError::Os {
                op,
                pid: self.pid,
                source: std::io::Error::other("injected failure"),
            });
        }
        let attrs = state
            .live
            .get_mut(&self.pid)
            .ok_or(ControlError::NoSuchProcess(self.pid))?;
        f(attrs);
        Ok(())
    }
}

impl ProcessHandle for FakeHandle {
    fn set_priority_class(&self, class: PriorityClass) -> Result<(), ControlError> {
        self.update("priority", |a| a.priority = Some(class))
    }

    fn set_affinity(&self, cores: &[usize]) -> Result<(), ControlError> {
        self.update("affinity", |a| a.affinity = Some(cores.to_vec()))
    }

    fn set_io_priority(&self, priority: IoPriority) -> Result<(), ControlError> {
        self.update("io_priority", |a| a.io_priority = Some(priority))
    }

    fn set_gpu_priority(&self, priority: GpuPriority) -> Result<(), ControlError> {
        self.update("gpu_priority", |a| a.gpu_priority = Some(priority))
    }

    fn set_power_throttling(&self, state: PowerThrottlingState) -> Result<(), ControlError> {
        self.update("power_throttling", |a| a.power_throttling = Some(state))
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_handles -= 1;
        }
    }
}

enum Behaviour {
    List,
    Fail,
}

/// Fixed process table, optionally failing or panicking on chosen calls
pub struct FakeSource {
    entries: Vec<ProcessEntry>,
    behaviour: Behaviour,
    panic_on_call: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(entries: Vec<ProcessEntry>) -> Self {
        Self {
            entries,
            behaviour: Behaviour::List,
            panic_on_call: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::new(Vec::new())
        }
    }

    /// Panic on the given 1-based call
    pub fn panic_on_call(mut self, call: usize) -> Self {
        self.panic_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ProcessSource for FakeSource {
    fn processes(&mut self) -> Result<Vec<ProcessEntry>, ScanError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_call == Some(call) {
            panic!("process table corrupted on call {call}");
        }
        match self.behaviour {
            Behaviour::List => Ok(self.entries.clone()),
            Behaviour::Fail => Err(ScanError::Unavailable("injected failure".to_string())),
        }
    }
}
