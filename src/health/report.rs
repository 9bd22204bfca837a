//! Health report types

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::browser::FatalErrorKind;

/// Overall instance status, worst first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Critical,
    Disconnected,
    Degraded,
    Healthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "critical",
            Self::Disconnected => "disconnected",
            Self::Degraded => "degraded",
            Self::Healthy => "healthy",
        })
    }
}

/// Transport and protocol reachability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Connectivity {
    pub connected: bool,
    pub protocol_responsive: bool,
}

impl Connectivity {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.connected && self.protocol_responsive
    }
}

/// Advice attached to a report by a failing probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Surface round-trip failed with an unclassified error
    RestartRequired { detail: String },
    /// Version request failed or exceeded the probe deadline
    Unresponsive { detail: String },
    HighMemory { resident_bytes: u64, limit_bytes: u64 },
    /// Request interception could not be toggled
    NetworkUnavailable { detail: String },
    /// Surfaces could not be listed; page count is unknown
    SurfaceListingFailed { detail: String },
}

impl Recommendation {
    /// Whether this recommendation alone justifies a restart of a
    /// non-healthy instance.
    #[must_use]
    pub fn forces_restart(&self) -> bool {
        matches!(
            self,
            Self::RestartRequired { .. } | Self::HighMemory { .. } | Self::NetworkUnavailable { .. }
        )
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestartRequired { detail } => write!(f, "restart required: {detail}"),
            Self::Unresponsive { detail } => write!(f, "browser unresponsive: {detail}"),
            Self::HighMemory {
                resident_bytes,
                limit_bytes,
            } => write!(
                f,
                "high memory: {} MB resident (limit {} MB)",
                resident_bytes / (1024 * 1024),
                limit_bytes / (1024 * 1024)
            ),
            Self::NetworkUnavailable { detail } => {
                write!(f, "network subsystem unavailable: {detail}")
            }
            Self::SurfaceListingFailed { detail } => {
                write!(f, "could not list surfaces: {detail}")
            }
        }
    }
}

/// Immutable snapshot produced by one assessment
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub page_count: usize,
    /// Latency of the version round-trip
    pub response_time: Duration,
    pub network_capable: bool,
    pub recommendations: Vec<Recommendation>,
    pub critical: bool,
    /// First fatal signature seen by any probe
    pub fatal_error: Option<FatalErrorKind>,
    pub connectivity: Connectivity,
}

impl HealthReport {
    /// Healthy means able to intercept requests; nothing else gates it.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.network_capable
    }

    /// Report for an absent instance or one without a process.
    #[must_use]
    pub fn absent(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Critical,
            page_count: 0,
            response_time: Duration::ZERO,
            network_capable: false,
            recommendations: vec![Recommendation::RestartRequired {
                detail: detail.into(),
            }],
            critical: true,
            fatal_error: None,
            connectivity: Connectivity::default(),
        }
    }

    /// Status in priority order: critical flag, connectivity, any
    /// recommendation.
    #[must_use]
    pub fn derive_status(
        critical: bool,
        connectivity: Connectivity,
        recommendations: &[Recommendation],
    ) -> HealthStatus {
        if critical {
            HealthStatus::Critical
        } else if !connectivity.is_ok() {
            HealthStatus::Disconnected
        } else if !recommendations.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
