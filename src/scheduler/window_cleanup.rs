//! Post-batch surface reclamation
//!
//! Softer than a restart: closes every surface except the instance's
//! original one and leaves the browser running.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::{BrowserInstance, Surface, SurfaceMetrics};
use crate::utils::{BYTES_PER_DOM_NODE, BYTES_PER_EVENT_LISTENER, with_timeout};

#[derive(Debug, Clone)]
pub struct CleanupSettings {
    /// Wait after a batch drains before reclaiming
    pub settle_delay: Duration,
    /// Deadline for each metrics read and close
    pub surface_timeout: Duration,
    /// Estimate used when a surface reports no metrics
    pub default_surface_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclaimReport {
    pub batch_label: String,
    pub surfaces_found: usize,
    pub closed: usize,
    pub failed: usize,
    pub estimated_bytes: u64,
}

impl ReclaimReport {
    #[must_use]
    pub fn close_attempts(&self) -> usize {
        self.closed + self.failed
    }
}

pub struct GroupWindowCleanup {
    settings: CleanupSettings,
}

impl GroupWindowCleanup {
    pub fn new(settings: CleanupSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &CleanupSettings {
        &self.settings
    }

    /// Wait `delay`, then close all but the first surface of `instance`.
    pub async fn reclaim(&self, instance: &BrowserInstance, batch_label: &str, delay: Duration) -> ReclaimReport {
        let mut report = ReclaimReport {
            batch_label: batch_label.to_string(),
            ..ReclaimReport::default()
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let surfaces = match with_timeout(instance.surfaces(), self.settings.surface_timeout, "surface listing").await {
            Ok(surfaces) => surfaces,
            Err(e) => {
                warn!(instance = instance.id(), batch = batch_label, error = %e, "window cleanup could not list surfaces");
                return report;
            }
        };
        report.surfaces_found = surfaces.len();

        for surface in surfaces.iter().skip(1) {
            let estimate = self.estimate_bytes(surface.as_ref()).await;
            match with_timeout(surface.close(), self.settings.surface_timeout, "surface close").await {
                Ok(()) => {
                    report.closed += 1;
                    report.estimated_bytes += estimate;
                }
                Err(e) => {
                    report.failed += 1;
                    debug!(surface = %surface.id(), error = %e, "window cleanup close failed");
                }
            }
        }

        if report.close_attempts() > 0 {
            info!(
                instance = instance.id(),
                batch = batch_label,
                closed = report.closed,
                failed = report.failed,
                reclaimed_mb = report.estimated_bytes / (1024 * 1024),
                "reclaimed batch surfaces"
            );
        }
        report
    }

    async fn estimate_bytes(&self, surface: &dyn Surface) -> u64 {
        match with_timeout(surface.metrics(), self.settings.surface_timeout, "surface metrics").await {
            Ok(metrics) => estimate_from_metrics(&metrics).unwrap_or(self.settings.default_surface_bytes),
            Err(_) => self.settings.default_surface_bytes,
        }
    }
}

/// Rough retained size from runtime metrics; `None` when nothing was reported.
#[must_use]
pub fn estimate_from_metrics(metrics: &SurfaceMetrics) -> Option<u64> {
    let bytes = metrics.js_heap_used_bytes
        + metrics.dom_nodes * BYTES_PER_DOM_NODE
        + metrics.event_listeners * BYTES_PER_EVENT_LISTENER;
    (bytes > 0).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_from_metrics() {
        let metrics = SurfaceMetrics {
            js_heap_used_bytes: 1_000_000,
            dom_nodes: 500,
            event_listeners: 10,
        };
        assert_eq!(estimate_from_metrics(&metrics), Some(1_000_000 + 100_000 + 1_000));
        assert_eq!(estimate_from_metrics(&SurfaceMetrics::default()), None);
    }
}
