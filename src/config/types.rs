//! Core configuration type for fleet runs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_CONCURRENCY, DEFAULT_FAILURE_STREAK_MIN,
    DEFAULT_FAILURE_STREAK_MIN_URLS, DEFAULT_FAILURE_WINDOW, DEFAULT_GRACEFUL_TIMEOUT_SECS,
    DEFAULT_MEMORY_HIGH_WATER_MB, DEFAULT_PAGE_COUNT_CEILING, DEFAULT_PROBE_TIMEOUT_SECS,
    DEFAULT_PROFILE_PREFIX, DEFAULT_SIGNAL_GRACE_SECS,
    DEFAULT_SLOW_RESPONSE_MS, DEFAULT_SURFACE_MEMORY_ESTIMATE_MB, DEFAULT_SURFACE_OP_TIMEOUT_SECS,
    DEFAULT_TASK_TIMEOUT_SECS, DEFAULT_WINDOW_SETTLE_DELAY_SECS, LAUNCH_ATTEMPTS,
    LAUNCH_RETRY_DELAY_MS,
};

/// Tunables for one fleet run
///
/// Every field has a default, so a config file only needs the fields it
/// changes. Build through [`FleetConfig::builder`] to get validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Semaphore width shared by every batch
    pub(crate) concurrency: usize,

    pub(crate) headless: bool,
    pub(crate) browser_executable: Option<PathBuf>,
    pub(crate) extra_browser_args: Vec<String>,
    pub(crate) profile_prefix: String,

    /// Command-line regex for the pattern kill-all tier.
    ///
    /// Must only match browsers this tool launched. Derived from
    /// `profile_prefix` when unset.
    pub(crate) process_pattern: Option<String>,

    pub(crate) probe_timeout_secs: u64,
    pub(crate) memory_high_water_mb: u64,
    /// Log failing health probes at warn instead of debug
    pub(crate) verbose_diagnostics: bool,

    pub(crate) cleanup_interval: usize,
    pub(crate) slow_response_ms: u64,
    pub(crate) page_count_ceiling: usize,
    pub(crate) failure_window: usize,
    pub(crate) failure_streak_min: usize,
    pub(crate) failure_streak_min_urls: usize,

    pub(crate) graceful_timeout_secs: u64,
    pub(crate) signal_grace_secs: u64,

    /// Reclaim surfaces after each batch
    pub(crate) window_cleanup: bool,
    pub(crate) window_settle_delay_secs: u64,
    pub(crate) surface_memory_estimate_mb: u64,

    pub(crate) task_timeout_secs: u64,
    pub(crate) surface_timeout_secs: u64,

    pub(crate) launch_attempts: u32,
    pub(crate) launch_retry_delay_ms: u64,

    /// Purge leftover profile directories before the first launch
    pub(crate) purge_stale_profiles: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            headless: true,
            browser_executable: None,
            extra_browser_args: Vec::new(),
            profile_prefix: DEFAULT_PROFILE_PREFIX.to_string(),
            process_pattern: None,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            memory_high_water_mb: DEFAULT_MEMORY_HIGH_WATER_MB,
            verbose_diagnostics: false,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            slow_response_ms: DEFAULT_SLOW_RESPONSE_MS,
            page_count_ceiling: DEFAULT_PAGE_COUNT_CEILING,
            failure_window: DEFAULT_FAILURE_WINDOW,
            failure_streak_min: DEFAULT_FAILURE_STREAK_MIN,
            failure_streak_min_urls: DEFAULT_FAILURE_STREAK_MIN_URLS,
            graceful_timeout_secs: DEFAULT_GRACEFUL_TIMEOUT_SECS,
            signal_grace_secs: DEFAULT_SIGNAL_GRACE_SECS,
            window_cleanup: true,
            window_settle_delay_secs: DEFAULT_WINDOW_SETTLE_DELAY_SECS,
            surface_memory_estimate_mb: DEFAULT_SURFACE_MEMORY_ESTIMATE_MB,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            surface_timeout_secs: DEFAULT_SURFACE_OP_TIMEOUT_SECS,
            launch_attempts: LAUNCH_ATTEMPTS,
            launch_retry_delay_ms: LAUNCH_RETRY_DELAY_MS,
            purge_stale_profiles: true,
        }
    }
}
