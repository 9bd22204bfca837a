//! Fluent builder for `FleetConfig`
//!
//! Every field already has a default, so there are no required steps;
//! `build()` is where the values are checked against each other.

use std::path::PathBuf;

use regex::Regex;

use super::types::FleetConfig;
use crate::error::ConfigError;
use crate::utils::MAX_CONCURRENCY;

impl FleetConfig {
    #[must_use]
    pub fn builder() -> FleetConfigBuilder {
        FleetConfigBuilder::default()
    }

    /// Continue building from an existing config, e.g. one read from disk.
    #[must_use]
    pub fn into_builder(self) -> FleetConfigBuilder {
        FleetConfigBuilder { config: self }
    }

    /// Check ranges and the process pattern.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Concurrency {
                value: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        let non_zero = [
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("graceful_timeout_secs", self.graceful_timeout_secs),
            ("task_timeout_secs", self.task_timeout_secs),
            ("surface_timeout_secs", self.surface_timeout_secs),
            ("cleanup_interval", self.cleanup_interval as u64),
            ("failure_window", self.failure_window as u64),
            ("failure_streak_min", self.failure_streak_min as u64),
            ("launch_attempts", u64::from(self.launch_attempts)),
        ];
        if let Some((field, _)) = non_zero.into_iter().find(|&(_, value)| value == 0) {
            return Err(ConfigError::Zero { field });
        }

        let pattern = self.process_pattern();
        if pattern.trim().is_empty() {
            return Err(ConfigError::ProcessPattern {
                pattern,
                reason: "pattern is empty and would match every process".to_string(),
            });
        }
        if let Err(e) = Regex::new(&pattern) {
            return Err(ConfigError::ProcessPattern {
                pattern,
                reason: e.to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FleetConfigBuilder {
    config: FleetConfig,
}

impl FleetConfigBuilder {
    #[must_use]
    pub fn concurrency(mut self, width: usize) -> Self {
        self.config.concurrency = width;
        self
    }

    /// Headed mode needs a display server; keep the default outside local
    /// debugging.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    #[must_use]
    pub fn browser_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_executable = Some(path.into());
        self
    }

    #[must_use]
    pub fn extra_browser_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_browser_args.push(arg.into());
        self
    }

    #[must_use]
    pub fn profile_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.profile_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn process_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.process_pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn memory_high_water_mb(mut self, mb: u64) -> Self {
        self.config.memory_high_water_mb = mb;
        self
    }

    #[must_use]
    pub fn verbose_diagnostics(mut self, verbose: bool) -> Self {
        self.config.verbose_diagnostics = verbose;
        self
    }

    #[must_use]
    pub fn cleanup_interval(mut self, urls: usize) -> Self {
        self.config.cleanup_interval = urls;
        self
    }

    #[must_use]
    pub fn slow_response_ms(mut self, ms: u64) -> Self {
        self.config.slow_response_ms = ms;
        self
    }

    #[must_use]
    pub fn page_count_ceiling(mut self, pages: usize) -> Self {
        self.config.page_count_ceiling = pages;
        self
    }

    /// Failure-streak override: `min_failures` failures among the last
    /// `window` outcomes, once more than `min_urls` URLs ran on the instance.
    #[must_use]
    pub fn failure_streak(mut self, window: usize, min_failures: usize, min_urls: usize) -> Self {
        self.config.failure_window = window;
        self.config.failure_streak_min = min_failures;
        self.config.failure_streak_min_urls = min_urls;
        self
    }

    #[must_use]
    pub fn graceful_timeout_secs(mut self, secs: u64) -> Self {
        self.config.graceful_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn signal_grace_secs(mut self, secs: u64) -> Self {
        self.config.signal_grace_secs = secs;
        self
    }

    #[must_use]
    pub fn window_cleanup(mut self, enabled: bool) -> Self {
        self.config.window_cleanup = enabled;
        self
    }

    #[must_use]
    pub fn window_settle_delay_secs(mut self, secs: u64) -> Self {
        self.config.window_settle_delay_secs = secs;
        self
    }

    #[must_use]
    pub fn surface_memory_estimate_mb(mut self, mb: u64) -> Self {
        self.config.surface_memory_estimate_mb = mb;
        self
    }

    #[must_use]
    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn surface_timeout_secs(mut self, secs: u64) -> Self {
        self.config.surface_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn launch_retries(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.config.launch_attempts = attempts;
        self.config.launch_retry_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn purge_stale_profiles(mut self, purge: bool) -> Self {
        self.config.purge_stale_profiles = purge;
        self
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value is out of range or the
    /// process pattern does not compile.
    pub fn build(self) -> Result<FleetConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
