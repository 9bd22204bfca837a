//! Shared default values for the fleet orchestrator
//!
//! Every tunable in `FleetConfig` starts from one of these.

/// Concurrent scan tasks admitted per batch
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound accepted for the concurrency width
///
/// Each tab costs 50-150MB of renderer memory; beyond this a single
/// controller process becomes the bottleneck anyway.
pub const MAX_CONCURRENCY: usize = 32;

/// Deadline for each health probe family
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 8;

/// Resident memory above which a restart is recommended
pub const DEFAULT_MEMORY_HIGH_WATER_MB: u64 = 2048;

/// URLs processed on one instance before a scheduled restart
pub const DEFAULT_CLEANUP_INTERVAL: usize = 40;

/// Version round-trip slower than this triggers a restart
pub const DEFAULT_SLOW_RESPONSE_MS: u64 = 6000;

/// Open surfaces above this count are treated as a leak
pub const DEFAULT_PAGE_COUNT_CEILING: usize = 40;

/// Rolling window of recent task outcomes
pub const DEFAULT_FAILURE_WINDOW: usize = 3;

/// Failures inside the window that trip the streak override
pub const DEFAULT_FAILURE_STREAK_MIN: usize = 2;

/// The streak override only fires past this many URLs on the instance
pub const DEFAULT_FAILURE_STREAK_MIN_URLS: usize = 5;

/// Budget for the graceful termination tier
pub const DEFAULT_GRACEFUL_TIMEOUT_SECS: u64 = 10;

/// Wait between SIGTERM and SIGKILL in the signal tier
pub const DEFAULT_SIGNAL_GRACE_SECS: u64 = 3;

/// Settle delay before reclaiming a finished batch's surfaces
pub const DEFAULT_WINDOW_SETTLE_DELAY_SECS: u64 = 16;

/// Reclaimed-memory estimate for a surface without metrics
pub const DEFAULT_SURFACE_MEMORY_ESTIMATE_MB: u64 = 8;

/// Rough retained size of one DOM node
pub const BYTES_PER_DOM_NODE: u64 = 200;

/// Rough retained size of one JS event listener
pub const BYTES_PER_EVENT_LISTENER: u64 = 100;

/// Deadline for one scan task's strategy
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 45;

/// Deadline for opening or closing a single surface
pub const DEFAULT_SURFACE_OP_TIMEOUT_SECS: u64 = 10;

/// Prefix of per-instance profile directories
pub const DEFAULT_PROFILE_PREFIX: &str = "scanfleet_chrome";

/// Command-line flag that carries the profile dir; the nuclear kill tier
/// matches it followed by the profile prefix.
pub const PROFILE_DIR_FLAG: &str = "user-data-dir=";

/// Launch attempts before a batch is reported as failed
pub const LAUNCH_ATTEMPTS: u32 = 3;

/// Backoff between launch attempts
pub const LAUNCH_RETRY_DELAY_MS: u64 = 2000;
