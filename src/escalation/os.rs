//! OS process seam: enumeration, signals, liveness and memory

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use thiserror::Error;
use tracing::debug;

/// Termination signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM: ask the process to exit
    Terminate,
    /// SIGKILL: no questions asked
    Kill,
}

#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("process enumeration unavailable: {0}")]
    EnumerationFailed(String),

    #[error("failed to signal pid {pid}: {reason}")]
    SignalFailed { pid: u32, reason: String },

    #[error("pattern kill failed: {0}")]
    PatternKillFailed(String),
}

/// Snapshot of one OS process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent: Option<u32>,
    /// Arguments joined with spaces
    pub command_line: String,
}

/// Everything the orchestrator needs from the operating system
pub trait ProcessControl: Send + Sync {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, ProcessError>;

    /// Signal one pid. A pid that is already gone is not an error.
    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError>;

    /// Running and not a zombie.
    fn is_alive(&self, pid: u32) -> bool;

    /// Resident set size in bytes
    fn resident_memory(&self, pid: u32) -> Option<u64>;

    /// Force-kill every process whose command line matches `pattern`.
    fn kill_matching(&self, pattern: &str) -> Result<(), ProcessError>;
}

/// `sysinfo` for enumeration and memory, `libc::kill` for signals
pub struct SystemProcessControl {
    system: Mutex<System>,
}

impl SystemProcessControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for SystemProcessControl {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProcessError::EnumerationFailed(
                "platform not supported by sysinfo".to_string(),
            ));
        }

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        let processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            // Linux reports threads as tasks; signal whole processes only
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                parent: process.parent().map(Pid::as_u32),
                command_line: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect();

        if processes.is_empty() {
            return Err(ProcessError::EnumerationFailed(
                "process table is empty".to_string(),
            ));
        }
        Ok(processes)
    }

    #[cfg(unix)]
    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        let signo = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        let raw = libc::pid_t::try_from(pid).map_err(|_| ProcessError::SignalFailed {
            pid,
            reason: "pid out of range".to_string(),
        })?;

        // SAFETY: plain kill(2) on a single positive pid.
        let result = unsafe { libc::kill(raw, signo) };
        if result == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(ProcessError::SignalFailed {
            pid,
            reason: err.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        let sys_signal = match signal {
            Signal::Terminate => sysinfo::Signal::Term,
            Signal::Kill => sysinfo::Signal::Kill,
        };
        let mut system = self.system.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        match system.process(target) {
            None => Ok(()),
            Some(process) => match process.kill_with(sys_signal) {
                Some(true) => Ok(()),
                // signal not supported here; fall back to a hard kill
                None if process.kill() => Ok(()),
                _ => Err(ProcessError::SignalFailed {
                    pid,
                    reason: "kill rejected".to_string(),
                }),
            },
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut system = self.system.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(target)
            .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
    }

    fn resident_memory(&self, pid: u32) -> Option<u64> {
        let mut system = self.system.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(target).map(sysinfo::Process::memory)
    }

    #[cfg(unix)]
    fn kill_matching(&self, pattern: &str) -> Result<(), ProcessError> {
        let status = std::process::Command::new("pkill")
            .args(["-9", "-f", pattern])
            .status()
            .map_err(|e| ProcessError::PatternKillFailed(e.to_string()))?;

        // pkill exits 1 when nothing matched
        match status.code() {
            Some(0 | 1) => {
                debug!(pattern, matched = status.success(), "pattern kill issued");
                Ok(())
            }
            _ => Err(ProcessError::PatternKillFailed(format!(
                "pkill exited with {status}"
            ))),
        }
    }

    #[cfg(not(unix))]
    fn kill_matching(&self, pattern: &str) -> Result<(), ProcessError> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| ProcessError::PatternKillFailed(e.to_string()))?;
        let targets: Vec<u32> = self
            .list_processes()?
            .into_iter()
            .filter(|p| regex.is_match(&p.command_line))
            .map(|p| p.pid)
            .collect();
        for pid in targets {
            let _ = self.send_signal(pid, Signal::Kill);
        }
        Ok(())
    }
}
