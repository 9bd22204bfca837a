//! Restart decision rules

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::counters::RunCounters;
use crate::browser::FatalErrorKind;
use crate::health::{HealthReport, HealthStatus};

/// Thresholds for the routine restart rules
#[derive(Debug, Clone)]
pub struct RestartThresholds {
    /// URLs per instance before a scheduled restart
    pub cleanup_interval: usize,
    pub slow_response: Duration,
    pub page_count_ceiling: usize,
    /// Outcomes considered by the failure-streak override
    pub failure_window: usize,
    /// Failures in the window that trip the override
    pub failure_streak_min: usize,
    /// The override needs strictly more URLs than this on the instance
    pub failure_streak_min_urls: usize,
}

/// Why the scheduler is (or is not) restarting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestartReason {
    CriticalProtocolError { fatal: Option<FatalErrorKind> },
    ConnectivityLost,
    HealthDegraded { status: HealthStatus, recommendation: String },
    ScheduledCleanup { urls: usize },
    SlowResponse { elapsed: Duration },
    PageLeak { pages: usize },
    FailureStreak { failures: usize, window: usize },
    /// A task saw the browser break mid-run
    Emergency,
    Continue,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalProtocolError { fatal: Some(kind) } => {
                write!(f, "critical protocol error ({kind})")
            }
            Self::CriticalProtocolError { fatal: None } => f.write_str("critical protocol error"),
            Self::ConnectivityLost => f.write_str("connectivity lost"),
            Self::HealthDegraded {
                status,
                recommendation,
            } => write!(f, "health {status}: {recommendation}"),
            Self::ScheduledCleanup { urls } => {
                write!(f, "scheduled cleanup after {urls} urls")
            }
            Self::SlowResponse { elapsed } => {
                write!(f, "slow response ({}ms)", elapsed.as_millis())
            }
            Self::PageLeak { pages } => write!(f, "page leak protection ({pages} open pages)"),
            Self::FailureStreak { failures, window } => {
                write!(f, "failure streak ({failures} of last {window} tasks failed)")
            }
            Self::Emergency => f.write_str("emergency restart requested by task"),
            Self::Continue => f.write_str("continue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartDecision {
    pub should_restart: bool,
    pub reason: RestartReason,
}

impl RestartDecision {
    fn restart(reason: RestartReason) -> Self {
        Self {
            should_restart: true,
            reason,
        }
    }

    #[must_use]
    pub fn proceed() -> Self {
        Self {
            should_restart: false,
            reason: RestartReason::Continue,
        }
    }
}

/// Combine a health report with run counters. First matching rule wins;
/// the failure-streak override applies only when no rule matched.
#[must_use]
pub fn decide(
    report: &HealthReport,
    counters: &RunCounters,
    thresholds: &RestartThresholds,
) -> RestartDecision {
    if report.critical {
        return RestartDecision::restart(RestartReason::CriticalProtocolError {
            fatal: report.fatal_error,
        });
    }

    if !report.connectivity.is_ok() {
        return RestartDecision::restart(RestartReason::ConnectivityLost);
    }

    if report.status != HealthStatus::Healthy
        && let Some(rec) = report.recommendations.iter().find(|r| r.forces_restart())
    {
        return RestartDecision::restart(RestartReason::HealthDegraded {
            status: report.status,
            recommendation: rec.to_string(),
        });
    }

    if counters.urls_since_cleanup >= thresholds.cleanup_interval {
        return RestartDecision::restart(RestartReason::ScheduledCleanup {
            urls: counters.urls_since_cleanup,
        });
    }

    if report.response_time > thresholds.slow_response {
        return RestartDecision::restart(RestartReason::SlowResponse {
            elapsed: report.response_time,
        });
    }

    if report.page_count > thresholds.page_count_ceiling {
        return RestartDecision::restart(RestartReason::PageLeak {
            pages: report.page_count,
        });
    }

    let failures = counters.recent_failures();
    if failures >= thresholds.failure_streak_min
        && counters.urls_since_cleanup > thresholds.failure_streak_min_urls
    {
        return RestartDecision::restart(RestartReason::FailureStreak {
            failures,
            window: counters.window(),
        });
    }

    RestartDecision::proceed()
}
