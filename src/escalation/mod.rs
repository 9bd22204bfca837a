//! Process escalation: graceful → signal → nuclear termination ladder
//!
//! Each tier is allowed to fail quietly because the next tier is the
//! recovery for it. Only running out of tiers is reported to the caller,
//! and only the caller knows whether that is fatal (final shutdown) or
//! merely logged (mid-run restart).

pub mod os;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserInstance, profile};
use crate::utils::with_timeout;
pub use os::{ProcessControl, ProcessError, ProcessInfo, Signal, SystemProcessControl};

/// Poll interval while waiting for a process to disappear
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a tier that reported success gets to let the process exit
const EXIT_CONFIRM_WINDOW: Duration = Duration::from_secs(2);

/// Pause after SIGKILL before re-checking liveness
const KILL_SETTLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct EscalationSettings {
    /// Budget for tier 1
    pub graceful_timeout: Duration,
    /// SIGTERM → SIGKILL wait in tier 2
    pub signal_grace: Duration,
    /// Per-surface close deadline inside tier 1
    pub surface_close_timeout: Duration,
    /// Command-line regex for tier 3
    pub process_pattern: String,
}

/// One rung of the termination ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    Graceful,
    Signal,
    Nuclear,
}

impl EscalationTier {
    /// Tiers in the order they are tried
    pub const LADDER: [Self; 3] = [Self::Graceful, Self::Signal, Self::Nuclear];
}

impl fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graceful => "graceful",
            Self::Signal => "signal",
            Self::Nuclear => "nuclear",
        })
    }
}

/// Record of one tier attempt
#[derive(Debug, Clone, Serialize)]
pub struct TierAttempt {
    pub tier: EscalationTier,
    pub confirmed_gone: bool,
    /// Why the tier failed, if it did
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminationOutcome {
    /// Instance confirmed gone
    pub terminated: bool,
    /// Tier that confirmed termination
    pub resolved_by: Option<EscalationTier>,
    pub attempts: Vec<TierAttempt>,
}

impl TerminationOutcome {
    /// Whether we had to go past the graceful tier
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// Walks the termination ladder for one instance at a time
pub struct ProcessEscalationManager {
    os: Arc<dyn ProcessControl>,
    settings: EscalationSettings,
}

impl ProcessEscalationManager {
    pub fn new(os: Arc<dyn ProcessControl>, settings: EscalationSettings) -> Self {
        Self { os, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &EscalationSettings {
        &self.settings
    }

    /// Terminate `instance` and every process it spawned.
    ///
    /// `timeout` bounds the graceful tier only. On success the instance's
    /// profile directory is removed.
    pub async fn terminate(&self, instance: &BrowserInstance, timeout: Duration) -> TerminationOutcome {
        info!(
            instance = instance.id(),
            pid = ?instance.pid(),
            "terminating browser instance"
        );

        let mut attempts = Vec::with_capacity(EscalationTier::LADDER.len());

        for tier in EscalationTier::LADDER {
            let result = match tier {
                EscalationTier::Graceful => self.graceful(instance, timeout).await,
                EscalationTier::Signal => self.signal_escalation(instance).await,
                EscalationTier::Nuclear => self.nuclear(instance).await,
            };

            let confirmed_gone = match &result {
                Ok(()) => self.wait_until_gone(instance, EXIT_CONFIRM_WINDOW).await,
                Err(_) => self.is_gone(instance),
            };

            if let Err(reason) = &result {
                warn!(instance = instance.id(), %tier, reason = %reason, "escalation tier failed");
            }

            attempts.push(TierAttempt {
                tier,
                confirmed_gone,
                error: result.err(),
            });

            if confirmed_gone {
                self.release(instance);
                info!(instance = instance.id(), %tier, "browser instance terminated");
                return TerminationOutcome {
                    terminated: true,
                    resolved_by: Some(tier),
                    attempts,
                };
            }
        }

        if instance.is_connected() {
            instance.controller().disconnect();
        }
        error!(
            instance = instance.id(),
            pid = ?instance.pid(),
            "cleanup failed: all escalation tiers exhausted"
        );
        TerminationOutcome {
            terminated: false,
            resolved_by: None,
            attempts,
        }
    }

    /// Tier 1: close every surface, then ask the browser to shut down.
    ///
    /// Succeeds immediately on an instance that is already gone, so calling
    /// it repeatedly is harmless.
    pub async fn graceful(&self, instance: &BrowserInstance, timeout: Duration) -> Result<(), String> {
        if self.is_gone(instance) {
            debug!(instance = instance.id(), "instance already terminated");
            return Ok(());
        }

        let controller = instance.controller();
        let shutdown = async {
            match instance.surfaces().await {
                Ok(surfaces) => {
                    for surface in surfaces {
                        if let Err(e) = with_timeout(
                            surface.close(),
                            self.settings.surface_close_timeout,
                            "surface close",
                        )
                        .await
                        {
                            debug!(surface = %surface.id(), error = %e, "surface close failed, skipping");
                        }
                    }
                }
                Err(e) => debug!(error = %e, "could not list surfaces before shutdown"),
            }
            controller.close().await
        };

        match tokio::time::timeout(timeout, shutdown).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("shutdown rejected: {e}")),
            Err(_) => Err(format!("graceful shutdown timed out after {timeout:?}")),
        }
    }

    /// Tier 2: SIGTERM the process group, wait, SIGKILL survivors.
    async fn signal_escalation(&self, instance: &BrowserInstance) -> Result<(), String> {
        let Some(root) = instance.pid() else {
            return Err("no tracked pid to signal".to_string());
        };

        let targets = match self.os.list_processes() {
            Ok(processes) => collect_targets(&processes, root, instance.profile_dir()),
            Err(e) => {
                warn!(error = %e, "process enumeration failed, signalling tracked pid only");
                vec![root]
            }
        };

        debug!(instance = instance.id(), targets = ?targets, "sending SIGTERM");
        for &pid in &targets {
            if let Err(e) = self.os.send_signal(pid, Signal::Terminate) {
                debug!(pid, error = %e, "SIGTERM failed");
            }
        }

        tokio::time::sleep(self.settings.signal_grace).await;

        let survivors: Vec<u32> = targets
            .iter()
            .copied()
            .filter(|&pid| self.os.is_alive(pid))
            .collect();

        if !survivors.is_empty() {
            debug!(instance = instance.id(), survivors = ?survivors, "sending SIGKILL");
            for &pid in &survivors {
                if let Err(e) = self.os.send_signal(pid, Signal::Kill) {
                    debug!(pid, error = %e, "SIGKILL failed");
                }
            }
            tokio::time::sleep(KILL_SETTLE).await;
        }

        let remaining = targets.iter().filter(|&&pid| self.os.is_alive(pid)).count();
        if remaining == 0 {
            Ok(())
        } else {
            Err(format!("{remaining} process(es) survived SIGKILL"))
        }
    }

    /// Tier 3: pattern kill-all, then drop the transport handle.
    async fn nuclear(&self, instance: &BrowserInstance) -> Result<(), String> {
        warn!(
            instance = instance.id(),
            pattern = %self.settings.process_pattern,
            "issuing pattern kill for browser processes"
        );
        let result = self
            .os
            .kill_matching(&self.settings.process_pattern)
            .map_err(|e| e.to_string());

        if instance.is_connected() {
            instance.controller().disconnect();
        }
        result
    }

    /// The root pid and every process in its tree are dead. With no pid,
    /// a dropped transport is the only signal available.
    fn is_gone(&self, instance: &BrowserInstance) -> bool {
        let Some(root) = instance.pid() else {
            return !instance.is_connected();
        };
        if self.os.is_alive(root) {
            return false;
        }
        match self.os.list_processes() {
            Ok(processes) => collect_targets(&processes, root, instance.profile_dir())
                .into_iter()
                .all(|pid| !self.os.is_alive(pid)),
            Err(e) => {
                debug!(error = %e, "process enumeration failed, checking tracked pid only");
                true
            }
        }
    }

    async fn wait_until_gone(&self, instance: &BrowserInstance, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.is_gone(instance) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    /// Post-termination bookkeeping: transport handle and profile dir.
    fn release(&self, instance: &BrowserInstance) {
        if instance.is_connected() {
            instance.controller().disconnect();
        }
        if let Some(dir) = instance.profile_dir() {
            profile::remove_profile_dir(dir);
        }
    }
}

/// Pids to signal for one instance: the root, all of its descendants, and
/// anything launched against its profile directory. Root comes first.
#[must_use]
pub fn collect_targets(processes: &[ProcessInfo], root: u32, profile_dir: Option<&Path>) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for process in processes {
        if let Some(parent) = process.parent {
            children.entry(parent).or_default().push(process.pid);
        }
    }

    let mut targets = vec![root];
    let mut seen: HashSet<u32> = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(&current).into_iter().flatten() {
            if seen.insert(child) {
                targets.push(child);
                queue.push_back(child);
            }
        }
    }

    if let Some(dir) = profile_dir.map(|d| d.to_string_lossy().into_owned())
        && !dir.is_empty()
    {
        for process in processes {
            if process.command_line.contains(&dir) && seen.insert(process.pid) {
                targets.push(process.pid);
            }
        }
    }

    targets
}
