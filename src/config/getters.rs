//! Accessors for `FleetConfig`

use std::path::Path;
use std::time::Duration;

use super::types::FleetConfig;
use crate::browser::profile;

impl FleetConfig {
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn browser_executable(&self) -> Option<&Path> {
        self.browser_executable.as_deref()
    }

    #[must_use]
    pub fn profile_prefix(&self) -> &str {
        &self.profile_prefix
    }

    /// Explicit pattern, or one matching this config's profile dirs.
    #[must_use]
    pub fn process_pattern(&self) -> String {
        self.process_pattern
            .clone()
            .unwrap_or_else(|| profile::command_line_pattern(&self.profile_prefix))
    }

    #[must_use]
    pub fn verbose_diagnostics(&self) -> bool {
        self.verbose_diagnostics
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> usize {
        self.cleanup_interval
    }

    #[must_use]
    pub fn window_cleanup(&self) -> bool {
        self.window_cleanup
    }

    #[must_use]
    pub fn window_settle_delay(&self) -> Duration {
        Duration::from_secs(self.window_settle_delay_secs)
    }

    #[must_use]
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_secs)
    }

    #[must_use]
    pub fn launch_attempts(&self) -> u32 {
        self.launch_attempts
    }

    #[must_use]
    pub fn launch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.launch_retry_delay_ms)
    }

    #[must_use]
    pub fn purge_stale_profiles(&self) -> bool {
        self.purge_stale_profiles
    }
}
