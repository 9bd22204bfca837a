//! One scan task: open a surface, run the strategy, close the surface

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::batch::{SiteBatch, TaskResult};
use super::strategy::{ScanError, ScanStrategy};
use crate::browser::{BrowserController, DriverError};
use crate::utils::with_timeout;

#[derive(Debug, Clone, Copy)]
pub struct TaskLimits {
    /// Deadline for the strategy
    pub task_timeout: Duration,
    /// Deadline for opening or closing the surface
    pub surface_timeout: Duration,
}

/// Run one URL to completion. Never fails; every outcome is a
/// [`TaskResult`]. The surface this task opens is closed on every path.
pub async fn run_task(
    controller: Arc<dyn BrowserController>,
    strategy: Arc<dyn ScanStrategy>,
    batch: Arc<SiteBatch>,
    url: String,
    limits: TaskLimits,
) -> TaskResult {
    let started = Instant::now();

    if let Err(e) = Url::parse(&url) {
        return finish(url, &batch, started, Err(ScanError::failed(format!("invalid url: {e}"))));
    }

    let surface = match with_timeout(controller.open_surface(), limits.surface_timeout, "open surface").await {
        Ok(surface) => surface,
        Err(e) => {
            warn!(url = %url, batch = %batch.label, error = %e, "could not open surface");
            return finish(url, &batch, started, Err(ScanError::Driver(e)));
        }
    };

    let outcome = match tokio::time::timeout(
        limits.task_timeout,
        strategy.scan(surface.as_ref(), &url, &batch),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(ScanError::Driver(DriverError::timeout(
            "scan task",
            limits.task_timeout,
        ))),
    };

    if let Err(e) = with_timeout(surface.close(), limits.surface_timeout, "close surface").await {
        debug!(url = %url, surface = %surface.id(), error = %e, "task surface close failed");
    }

    finish(url, &batch, started, outcome)
}

fn finish(url: String, batch: &SiteBatch, started: Instant, outcome: Result<Value, ScanError>) -> TaskResult {
    let elapsed = started.elapsed();
    match outcome {
        Ok(data) => {
            debug!(url = %url, batch = %batch.label, ?elapsed, "scan task succeeded");
            TaskResult {
                url,
                batch_label: batch.label.clone(),
                success: true,
                emergency_restart_needed: false,
                partial_data: data,
                error: None,
                elapsed,
            }
        }
        Err(e) => {
            let emergency = e.is_browser_fatal();
            if emergency {
                warn!(url = %url, batch = %batch.label, error = %e, "browser broke during scan task");
            } else {
                debug!(url = %url, batch = %batch.label, error = %e, "scan task failed");
            }
            TaskResult {
                url,
                batch_label: batch.label.clone(),
                success: false,
                emergency_restart_needed: emergency,
                partial_data: e.partial(),
                error: Some(e.to_string()),
                elapsed,
            }
        }
    }
}
