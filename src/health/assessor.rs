//! Multi-probe health assessment
//!
//! Probes never fail the assessment. Each one is raced against the probe
//! deadline and folds its outcome into the report.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::report::{Connectivity, HealthReport, Recommendation};
use crate::browser::{BrowserController, BrowserInstance, DriverError, FatalErrorKind, Surface};
use crate::escalation::ProcessControl;
use crate::utils::with_timeout;

const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Clone)]
pub struct HealthOptions {
    /// Deadline for each probe family
    pub probe_timeout: Duration,
    pub memory_high_water_bytes: u64,
    /// Log probe failures at warn instead of debug
    pub verbose: bool,
}

pub struct HealthAssessor {
    os: Arc<dyn ProcessControl>,
    options: HealthOptions,
}

impl HealthAssessor {
    pub fn new(os: Arc<dyn ProcessControl>, options: HealthOptions) -> Self {
        Self { os, options }
    }

    #[must_use]
    pub fn options(&self) -> &HealthOptions {
        &self.options
    }

    /// Run every probe family against `instance`.
    pub async fn assess(&self, instance: Option<&BrowserInstance>) -> HealthReport {
        let Some(instance) = instance else {
            return HealthReport::absent("no browser instance");
        };
        let Some(pid) = instance.pid() else {
            return HealthReport::absent("browser process not attached");
        };

        let controller = instance.controller();
        let mut recommendations = Vec::new();
        let mut fatal_error: Option<FatalErrorKind> = None;

        let page_count = match with_timeout(
            controller.surfaces(),
            self.options.probe_timeout,
            "surface listing",
        )
        .await
        {
            Ok(surfaces) => surfaces.len(),
            Err(e) => {
                self.probe_failed("surface listing", &e);
                recommendations.push(Recommendation::SurfaceListingFailed {
                    detail: e.to_string(),
                });
                0
            }
        };

        // Responsiveness
        let started = Instant::now();
        let version = with_timeout(
            controller.version(),
            self.options.probe_timeout,
            "version probe",
        )
        .await;
        let response_time = started.elapsed();
        match &version {
            Ok(v) => trace!(instance = instance.id(), version = %v, ?response_time, "version probe ok"),
            Err(e) => {
                self.probe_failed("responsiveness", e);
                recommendations.push(Recommendation::Unresponsive {
                    detail: e.to_string(),
                });
            }
        }

        // Surface round-trip
        if let Err(e) = self
            .with_throwaway_surface(controller.as_ref(), "surface round-trip", |surface| async move {
                surface.navigate(BLANK_PAGE).await
            })
            .await
        {
            self.probe_failed("surface round-trip", &e);
            match e.fatal_kind().or_else(|| e.is_timeout().then_some(FatalErrorKind::ProbeTimeout)) {
                Some(kind) => {
                    fatal_error.get_or_insert(kind);
                }
                None => recommendations.push(Recommendation::RestartRequired {
                    detail: e.to_string(),
                }),
            }
        }

        // Network capability
        let network = self
            .with_throwaway_surface(controller.as_ref(), "network capability", |surface| async move {
                surface.set_request_interception(true).await?;
                surface.set_request_interception(false).await
            })
            .await;
        let network_capable = match network {
            Ok(()) => true,
            Err(e) => {
                self.probe_failed("network capability", &e);
                match e.fatal_kind().or_else(|| e.is_timeout().then_some(FatalErrorKind::NetworkTimeout)) {
                    Some(kind) => {
                        fatal_error.get_or_insert(kind);
                    }
                    None => recommendations.push(Recommendation::NetworkUnavailable {
                        detail: e.to_string(),
                    }),
                }
                false
            }
        };

        // Connectivity: the transport flag plus a fresh round-trip
        let protocol_responsive = with_timeout(
            controller.version(),
            self.options.probe_timeout,
            "connectivity probe",
        )
        .await
        .inspect_err(|e| self.probe_failed("connectivity", e))
        .is_ok();
        let connectivity = Connectivity {
            connected: instance.is_connected(),
            protocol_responsive,
        };

        if let Some(resident_bytes) = self.resident_memory(pid).await
            && resident_bytes > self.options.memory_high_water_bytes
        {
            recommendations.push(Recommendation::HighMemory {
                resident_bytes,
                limit_bytes: self.options.memory_high_water_bytes,
            });
        }

        let critical = fatal_error.is_some();
        let status = HealthReport::derive_status(critical, connectivity, &recommendations);

        debug!(
            instance = instance.id(),
            %status,
            page_count,
            ?response_time,
            network_capable,
            fatal = ?fatal_error,
            recommendations = recommendations.len(),
            "health assessment complete"
        );

        HealthReport {
            status,
            page_count,
            response_time,
            network_capable,
            recommendations,
            critical,
            fatal_error,
            connectivity,
        }
    }

    /// Liveness plus one version round-trip.
    pub async fn quick_check(&self, instance: &BrowserInstance) -> bool {
        if !instance.is_live() {
            return false;
        }
        with_timeout(
            instance.controller().version(),
            self.options.probe_timeout,
            "quick check",
        )
        .await
        .inspect_err(|e| self.probe_failed("quick check", e))
        .is_ok()
    }

    /// Open a surface, run `op` on it, close it. Every step gets its own
    /// deadline and the close is attempted whatever `op` returned.
    async fn with_throwaway_surface<F, Fut>(
        &self,
        controller: &dyn BrowserController,
        probe: &str,
        op: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce(Arc<dyn Surface>) -> Fut,
        Fut: Future<Output = Result<(), DriverError>>,
    {
        let limit = self.options.probe_timeout;
        let surface = with_timeout(controller.open_surface(), limit, probe).await?;
        let result = with_timeout(op(Arc::clone(&surface)), limit, probe).await;
        if let Err(e) = with_timeout(surface.close(), limit, "probe surface close").await {
            trace!(probe, error = %e, "throwaway surface close failed");
        }
        result
    }

    /// Best-effort RSS read, off the async threads.
    async fn resident_memory(&self, pid: u32) -> Option<u64> {
        let os = Arc::clone(&self.os);
        let read = tokio::task::spawn_blocking(move || os.resident_memory(pid));
        match tokio::time::timeout(self.options.probe_timeout, read).await {
            Ok(Ok(rss)) => rss,
            _ => {
                trace!(pid, "resident memory unavailable");
                None
            }
        }
    }

    fn probe_failed(&self, probe: &str, error: &dyn Display) {
        if self.options.verbose {
            warn!(probe, error = %error, "health probe failed");
        } else {
            debug!(probe, error = %error, "health probe failed");
        }
    }
}
