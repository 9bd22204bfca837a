pub mod browser;
pub mod config;
pub mod error;
pub mod escalation;
pub mod health;
pub mod policy;
pub mod scheduler;
pub mod utils;

use std::sync::Arc;

pub use browser::{
    BrowserController, BrowserInstance, BrowserLauncher, ChromiumLauncher, ChromiumSettings,
    DriverError, FatalErrorKind, Surface, SurfaceMetrics,
};
pub use config::{FleetConfig, FleetConfigBuilder};
pub use error::{ConfigError, FleetError};
pub use escalation::{
    EscalationSettings, EscalationTier, ProcessControl, ProcessEscalationManager,
    SystemProcessControl, TerminationOutcome,
};
pub use health::{HealthAssessor, HealthOptions, HealthReport, HealthStatus, Recommendation};
pub use policy::{RestartDecision, RestartReason, RestartThresholds, RunCounters, decide};
pub use scheduler::{
    FleetScheduler, GroupWindowCleanup, NavigateScan, RunSummary, ScanError, ScanStrategy,
    SiteBatch, TaskResult,
};

/// Run `batches` to completion on a fresh fleet and shut it down.
///
/// # Errors
///
/// Fails on an invalid config, or with [`FleetError::CleanupFailed`] when
/// the last browser instance could not be terminated.
pub async fn schedule_run(
    config: FleetConfig,
    launcher: Arc<dyn BrowserLauncher>,
    os: Arc<dyn ProcessControl>,
    strategy: Arc<dyn ScanStrategy>,
    batches: Vec<SiteBatch>,
) -> Result<Vec<TaskResult>, FleetError> {
    config.validate()?;
    let mut scheduler = FleetScheduler::new(config, launcher, os, strategy);
    let results = scheduler.run(batches).await;
    scheduler.shutdown().await?;
    Ok(results)
}
