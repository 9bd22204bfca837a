//! Isolated Chrome profile directories
//!
//! Every launched instance gets its own UUID-named user data dir. The
//! directory belongs to the instance and is removed by whoever destroys it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::PROFILE_DIR_FLAG;

/// RAII wrapper for a profile directory
///
/// Removes the directory on drop unless ownership is moved out with
/// [`BrowserProfile::into_path`].
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the directory to another owner and disable auto-cleanup.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            remove_profile_dir(&self.path);
        }
    }
}

/// Command-line regex matching every browser launched with a profile
/// created under `prefix`, and nothing else.
#[must_use]
pub fn command_line_pattern(prefix: &str) -> String {
    format!("{PROFILE_DIR_FLAG}.*{}_", regex::escape(prefix))
}

/// Create `<tmp>/<prefix>_<uuid>`.
///
/// `create_dir` (not `create_dir_all`) so a collision fails loudly.
pub fn create_unique_profile(prefix: &str) -> Result<BrowserProfile> {
    let path = std::env::temp_dir().join(format!("{}_{}", prefix, Uuid::new_v4()));

    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    debug!(path = %path.display(), "created browser profile directory");
    Ok(BrowserProfile {
        path,
        cleanup_on_drop: true,
    })
}

/// Best-effort removal; failures are logged, never returned.
pub fn remove_profile_dir(path: &Path) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed browser profile directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove browser profile directory");
            false
        }
    }
}

/// Whether the profile's SingletonLock points at a dead process.
///
/// The lock is a symlink to `{hostname}-{pid}`.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target = target.to_string_lossy();
            if let Some(pid) = target
                .rsplit('-')
                .next()
                .and_then(|s| s.parse::<libc::pid_t>().ok())
            {
                // SAFETY: signal 0 only probes for existence.
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                return !exists;
            }
            warn!("Could not parse PID from SingletonLock target: {}", target);
            false
        }
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Remove leftover profiles with `prefix` from earlier crashed runs.
pub fn cleanup_stale_profiles(prefix: &str) -> Result<usize> {
    let temp_dir = std::env::temp_dir();
    let mut cleaned = 0;

    let entries = std::fs::read_dir(&temp_dir)
        .with_context(|| format!("Failed to read temp directory: {}", temp_dir.display()))?;

    let marker = format!("{prefix}_");
    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(&marker)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
            && remove_profile_dir(&path)
        {
            cleaned += 1;
        }
    }

    if cleaned > 0 {
        info!("Cleaned {} stale browser profile directories", cleaned);
    }
    Ok(cleaned)
}
