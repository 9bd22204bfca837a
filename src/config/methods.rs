//! Derived settings views and file loading
//!
//! Each component takes its own small settings struct; these methods are
//! the only place the flat config is split up.

use std::path::Path;
use std::time::Duration;

use super::types::FleetConfig;
use crate::browser::ChromiumSettings;
use crate::error::ConfigError;
use crate::escalation::EscalationSettings;
use crate::health::HealthOptions;
use crate::policy::RestartThresholds;
use crate::scheduler::{CleanupSettings, TaskLimits};

const MB: u64 = 1024 * 1024;

impl FleetConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn health_options(&self) -> HealthOptions {
        HealthOptions {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            memory_high_water_bytes: self.memory_high_water_mb.saturating_mul(MB),
            verbose: self.verbose_diagnostics(),
        }
    }

    #[must_use]
    pub fn restart_thresholds(&self) -> RestartThresholds {
        RestartThresholds {
            cleanup_interval: self.cleanup_interval(),
            slow_response: Duration::from_millis(self.slow_response_ms),
            page_count_ceiling: self.page_count_ceiling,
            failure_window: self.failure_window,
            failure_streak_min: self.failure_streak_min,
            failure_streak_min_urls: self.failure_streak_min_urls,
        }
    }

    #[must_use]
    pub fn escalation_settings(&self) -> EscalationSettings {
        EscalationSettings {
            graceful_timeout: Duration::from_secs(self.graceful_timeout_secs),
            signal_grace: Duration::from_secs(self.signal_grace_secs),
            surface_close_timeout: Duration::from_secs(self.surface_timeout_secs),
            process_pattern: self.process_pattern(),
        }
    }

    #[must_use]
    pub fn cleanup_settings(&self) -> CleanupSettings {
        CleanupSettings {
            settle_delay: Duration::from_secs(self.window_settle_delay_secs),
            surface_timeout: Duration::from_secs(self.surface_timeout_secs),
            default_surface_bytes: self.surface_memory_estimate_mb.saturating_mul(MB),
        }
    }

    #[must_use]
    pub fn task_limits(&self) -> TaskLimits {
        TaskLimits {
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            surface_timeout: Duration::from_secs(self.surface_timeout_secs),
        }
    }

    #[must_use]
    pub fn chromium_settings(&self) -> ChromiumSettings {
        ChromiumSettings {
            headless: self.headless(),
            executable: self.browser_executable().map(Path::to_path_buf),
            extra_args: self.extra_browser_args.clone(),
            profile_prefix: self.profile_prefix.clone(),
            request_timeout: Duration::from_secs(self.surface_timeout_secs.max(self.probe_timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: FleetConfig =
            serde_json::from_str(r#"{"concurrency": 5, "cleanup_interval": 10}"#).expect("valid json");
        assert_eq!(config.concurrency(), 5);
        assert_eq!(config.restart_thresholds().cleanup_interval, 10);
        assert_eq!(config.restart_thresholds().slow_response, Duration::from_millis(6000));
        assert_eq!(config.escalation_settings().signal_grace, Duration::from_secs(3));
    }

    #[test]
    fn test_memory_views_in_bytes() {
        let config = FleetConfig::builder()
            .memory_high_water_mb(2)
            .surface_memory_estimate_mb(8)
            .build()
            .expect("valid config");
        assert_eq!(config.health_options().memory_high_water_bytes, 2 * MB);
        assert_eq!(config.cleanup_settings().default_surface_bytes, 8 * MB);
    }

    #[test]
    fn test_from_json_file_validates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fleet.json");
        std::fs::write(&path, r#"{"concurrency": 0}"#).expect("write config");

        assert!(matches!(
            FleetConfig::from_json_file(&path),
            Err(ConfigError::Concurrency { .. })
        ));
    }
}
