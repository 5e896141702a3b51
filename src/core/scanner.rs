//! Process discovery - Enumerate live processes and keep the prefix matches

use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::trace;

/// A live process seen during one scan. Never carries an open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("process list unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current process table
pub trait ProcessSource {
    /// Fresh listing of running processes, defunct ones already left out
    fn processes(&mut self) -> Result<Vec<ProcessEntry>, ScanError>;
}

/// Case-insensitive name prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriterion {
    prefix: String,
}

impl MatchCriterion {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_lowercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().starts_with(&self.prefix)
    }
}

/// Filters each fresh process listing down to the names matching the criterion
pub struct ProcessScanner<S> {
    source: S,
    criterion: MatchCriterion,
}

impl<S: ProcessSource> ProcessScanner<S> {
    pub fn new(source: S, criterion: MatchCriterion) -> Self {
        Self { source, criterion }
    }

    pub fn criterion(&self) -> &MatchCriterion {
        &self.criterion
    }

    /// Enumerate running processes and yield the matching `(pid, name)` pairs
    pub fn scan(&mut self) -> Result<impl Iterator<Item = ProcessEntry>, ScanError> {
        let criterion = self.criterion.clone();
        let entries = self.source.processes()?;
        trace!(count = entries.len(), "Process table listed");

        Ok(entries
            .into_iter()
            .filter(move |entry| !entry.name.is_empty() && criterion.matches(&entry.name)))
    }
}

/// Process source backed by `sysinfo`
pub struct SysinfoSource {
    system: System,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoSource {
    fn processes(&mut self) -> Result<Vec<ProcessEntry>, ScanError> {
        // Names and status only; dead entries are dropped from the table
        let refreshed = self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new(),
        );
        if refreshed == 0 {
            // At least this agent is always running
            return Err(ScanError::Unavailable("empty process table".to_string()));
        }

        Ok(self
            .system
            .processes()
            .iter()
            // Linux lists every task of a process as its own entry
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(_, process)| !is_defunct(process.status()))
            .map(|(pid, process)| {
                ProcessEntry::new(pid.as_u32(), process.name().to_string_lossy().into_owned())
            })
            .collect())
    }
}

/// Zombie or dead processes cannot be demoted
pub fn is_defunct(status: ProcessStatus) -> bool {
    matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeSource;

    #[test]
    fn test_match_ignores_case() {
        let criterion = MatchCriterion::new("ace");
        for name in ["AceHelper.exe", "acehelper.exe", "ACEHELPER.EXE", "aCeBooster"] {
            assert!(criterion.matches(name), "{name} should match");
            assert_eq!(
                criterion.matches(name),
                criterion.matches(&name.to_uppercase())
            );
            assert_eq!(
                criterion.matches(name),
                criterion.matches(&name.to_lowercase())
            );
        }
    }

    #[test]
    fn test_criterion_is_lowercased_once() {
        let criterion = MatchCriterion::new("ACE");
        assert_eq!(criterion.prefix(), "ace");
        assert!(criterion.matches("acetool"));
    }

    #[test]
    fn test_non_prefix_names_do_not_match() {
        let criterion = MatchCriterion::new("ace");
        for name in ["notace.exe", "explorer.exe", "xace", " ace", "ac"] {
            assert!(!criterion.matches(name), "{name} should not match");
        }
    }

    #[test]
    fn test_scan_yields_only_matches() {
        let source = FakeSource::new(vec![
            ProcessEntry::new(1001, "AceHelper.exe"),
            ProcessEntry::new(1002, "notace.exe"),
            ProcessEntry::new(1003, "ACEBOOSTER"),
        ]);
        let mut scanner = ProcessScanner::new(source, MatchCriterion::new("ace"));

        let pids: Vec<u32> = scanner.scan().unwrap().map(|e| e.pid).collect();
        assert_eq!(pids, vec![1001, 1003]);
    }

    #[test]
    fn test_scan_skips_unnamed_entries() {
        let source = FakeSource::new(vec![ProcessEntry::new(7, ""), ProcessEntry::new(8, "ace")]);
        let mut scanner = ProcessScanner::new(source, MatchCriterion::new("ace"));

        let pids: Vec<u32> = scanner.scan().unwrap().map(|e| e.pid).collect();
        assert_eq!(pids, vec![8]);
    }

    #[test]
    fn test_scan_reenumerates_every_call() {
        let source = FakeSource::new(vec![ProcessEntry::new(1, "ace")]);
        let calls = source.calls();
        let mut scanner = ProcessScanner::new(source, MatchCriterion::new("ace"));

        assert_eq!(scanner.scan().unwrap().count(), 1);
        assert_eq!(scanner.scan().unwrap().count(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scan_propagates_source_failure() {
        let mut scanner = ProcessScanner::new(FakeSource::failing(), MatchCriterion::new("ace"));
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_defunct_statuses() {
        assert!(is_defunct(ProcessStatus::Zombie));
        assert!(is_defunct(ProcessStatus::Dead));
        assert!(!is_defunct(ProcessStatus::Run));
        assert!(!is_defunct(ProcessStatus::Sleep));
    }

    #[test]
    fn test_sysinfo_source_lists_current_process() {
        let mut source = SysinfoSource::new();
        let entries = source.processes().unwrap();
        let me = std::process::id();
        assert!(entries.iter().any(|e| e.pid == me));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sysinfo_source_does_not_list_threads() {
        use std::sync::{mpsc, Arc, Barrier};

        const THREADS: usize = 4;
        let release = Arc::new(Barrier::new(THREADS + 1));
        let (tx, rx) = mpsc::channel();
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let tx = tx.clone();
                let release = Arc::clone(&release);
                std::thread::spawn(move || {
                    tx.send(unsafe { libc::gettid() } as u32).unwrap();
                    release.wait();
                })
            })
            .collect();
        let tids: Vec<u32> = rx.iter().take(THREADS).collect();

        let entries = SysinfoSource::new().processes().unwrap();
        release.wait();
        for worker in workers {
            worker.join().unwrap();
        }

        let listed: Vec<u32> = entries
            .iter()
            .map(|e| e.pid)
            .filter(|pid| tids.contains(pid))
            .collect();
        assert!(listed.is_empty(), "threads listed as processes: {listed:?}");
        assert!(entries.iter().any(|e| e.pid == std::process::id()));
    }
}
