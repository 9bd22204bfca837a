//! Batch scheduler and worker pool
//!
//! Batches run strictly one after another. Within a batch every URL becomes
//! a spawned task gated by one semaphore that lives for the whole run; the
//! browser instance underneath it is what gets swapped on restart.

mod batch;
mod strategy;
mod summary;
mod task;
pub mod window_cleanup;

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub use batch::{SiteBatch, TaskResult};
pub use strategy::{NavigateScan, ScanError, ScanStrategy};
pub use summary::RunSummary;
pub use task::{TaskLimits, run_task};
pub use window_cleanup::{CleanupSettings, GroupWindowCleanup, ReclaimReport};

use crate::browser::{BrowserInstance, BrowserLauncher};
use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::escalation::{ProcessControl, ProcessEscalationManager};
use crate::health::HealthAssessor;
use crate::policy::{RestartDecision, RestartReason, RestartThresholds, RunCounters, decide};

pub struct FleetScheduler {
    config: FleetConfig,
    launcher: Arc<dyn BrowserLauncher>,
    strategy: Arc<dyn ScanStrategy>,
    /// Created once; never replaced on restart
    semaphore: Arc<Semaphore>,
    assessor: HealthAssessor,
    escalation: ProcessEscalationManager,
    window_cleanup: GroupWindowCleanup,
    thresholds: RestartThresholds,
    limits: TaskLimits,
    current: Option<BrowserInstance>,
    next_instance_id: u64,
    counters: RunCounters,
    summary: RunSummary,
}

impl FleetScheduler {
    pub fn new(
        config: FleetConfig,
        launcher: Arc<dyn BrowserLauncher>,
        os: Arc<dyn ProcessControl>,
        strategy: Arc<dyn ScanStrategy>,
    ) -> Self {
        let thresholds = config.restart_thresholds();
        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency())),
            assessor: HealthAssessor::new(Arc::clone(&os), config.health_options()),
            escalation: ProcessEscalationManager::new(os, config.escalation_settings()),
            window_cleanup: GroupWindowCleanup::new(config.cleanup_settings()),
            counters: RunCounters::new(thresholds.failure_window),
            limits: config.task_limits(),
            thresholds,
            launcher,
            strategy,
            current: None,
            next_instance_id: 1,
            summary: RunSummary::default(),
            config,
        }
    }

    #[must_use]
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Seed or adjust counters, e.g. when resuming a partially done run.
    pub fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.counters
    }

    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    #[must_use]
    pub fn current_instance(&self) -> Option<&BrowserInstance> {
        self.current.as_ref()
    }

    /// Run every batch in order and return one result per URL, in input order.
    pub async fn run(&mut self, batches: Vec<SiteBatch>) -> Vec<TaskResult> {
        let total = batches.len();
        let mut results = Vec::with_capacity(batches.iter().map(SiteBatch::len).sum());
        info!(
            batches = total,
            urls = results.capacity(),
            concurrency = self.config.concurrency(),
            "starting fleet run"
        );

        if self.current.is_none()
            && let Err(e) = self.launch_instance().await
        {
            error!(error = %e, "initial browser launch failed");
        }

        for (index, batch) in batches.into_iter().enumerate() {
            let is_last = index + 1 == total;
            let batch = Arc::new(batch);

            if self.current.as_ref().is_none_or(|instance| !instance.is_live()) {
                if self.current.is_some() {
                    warn!(batch = %batch.label, "browser instance is dead, relaunching");
                }
                self.restart(RestartReason::ConnectivityLost).await;
            } else if !is_last {
                let decision = self.evaluate(&batch).await;
                if decision.should_restart {
                    self.restart(decision.reason).await;
                }
            }

            let batch_results = self.run_batch(&batch).await;
            let emergency = batch_results.iter().any(|r| r.emergency_restart_needed);

            self.summary.record_batch(&batch_results);
            if self.current.is_some() {
                self.counters.record_batch(&batch_results);
            }
            results.extend(batch_results);

            if is_last {
                break;
            }

            if emergency {
                warn!(batch = %batch.label, "task reported a broken browser");
                self.restart(RestartReason::Emergency).await;
            } else if self.config.window_cleanup()
                && let Some(instance) = self.current.as_ref().filter(|i| i.is_live())
            {
                let report = self
                    .window_cleanup
                    .reclaim(instance, &batch.label, self.config.window_settle_delay())
                    .await;
                self.summary.record_reclaim(&report);
            }
        }

        info!(
            tasks = self.summary.tasks,
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            restarts = self.summary.restarts(),
            "fleet run complete"
        );
        results
    }

    /// Terminate the current instance as final shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::CleanupFailed`] if the instance survived every
    /// escalation tier.
    pub async fn shutdown(mut self) -> Result<RunSummary, FleetError> {
        if let Some(instance) = self.current.take() {
            let outcome = self
                .escalation
                .terminate(&instance, self.config.graceful_timeout())
                .await;
            if !outcome.terminated {
                self.summary.failed_terminations += 1;
                error!(instance = instance.id(), "cleanup failed at final shutdown");
                return Err(FleetError::CleanupFailed {
                    instance_id: instance.id(),
                    summary: Box::new(self.summary),
                });
            }
        }
        Ok(self.summary)
    }

    /// Health + policy, plus the look-ahead on the cleanup interval.
    async fn evaluate(&self, batch: &SiteBatch) -> RestartDecision {
        let report = self.assessor.assess(self.current.as_ref()).await;
        let decision = decide(&report, &self.counters, &self.thresholds);
        if decision.should_restart {
            return decision;
        }

        let since = self.counters.urls_since_cleanup;
        if since > 0 && since + batch.len() >= self.thresholds.cleanup_interval {
            return RestartDecision {
                should_restart: true,
                reason: RestartReason::ScheduledCleanup {
                    urls: since + batch.len(),
                },
            };
        }

        debug!(batch = %batch.label, status = %report.status, "continuing on current instance");
        decision
    }

    async fn restart(&mut self, reason: RestartReason) {
        info!(reason = %reason, "restarting browser instance");

        if let Some(old) = self.current.take() {
            let outcome = self
                .escalation
                .terminate(&old, self.config.graceful_timeout())
                .await;
            if !outcome.terminated {
                self.summary.failed_terminations += 1;
                error!(instance = old.id(), reason = %reason, "cleanup failed during restart, continuing");
            }
            if matches!(reason, RestartReason::Emergency) {
                self.summary.emergency_restarts += 1;
            } else {
                self.summary.routine_restarts += 1;
            }
        }
        self.counters.reset();

        if let Err(e) = self.launch_instance().await {
            error!(error = %e, "browser relaunch failed");
        }
    }

    async fn launch_instance(&mut self) -> Result<(), FleetError> {
        let attempts = self.config.launch_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.launcher.launch().await {
                Ok(controller) => {
                    let instance = BrowserInstance::new(self.next_instance_id, controller);
                    self.next_instance_id += 1;
                    info!(instance = instance.id(), pid = ?instance.pid(), attempt, "browser instance ready");
                    self.current = Some(instance);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "browser launch failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.launch_retry_delay()).await;
                    }
                }
            }
        }

        self.summary.launch_failures += 1;
        Err(FleetError::Launch {
            attempts,
            reason: last_error,
        })
    }

    /// Admit every URL of `batch` through the semaphore and wait for all of
    /// them. Results come back in URL order.
    async fn run_batch(&self, batch: &Arc<SiteBatch>) -> Vec<TaskResult> {
        let Some(instance) = self.current.as_ref() else {
            warn!(batch = %batch.label, "no browser instance, failing batch");
            return batch
                .urls
                .iter()
                .map(|url| TaskResult::not_started(url.as_str(), batch.label.as_str(), "no browser instance available"))
                .collect();
        };

        info!(batch = %batch.label, urls = batch.len(), instance = instance.id(), "running batch");

        let mut slots: Vec<Option<TaskResult>> = vec![None; batch.len()];
        let mut active = FuturesUnordered::new();

        for (position, url) in batch.urls.iter().enumerate() {
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                error!("Semaphore closed unexpectedly");
                slots[position] = Some(TaskResult::not_started(url.as_str(), batch.label.as_str(), "scheduler closed"));
                continue;
            };

            let controller = instance.controller();
            let strategy = Arc::clone(&self.strategy);
            let task_batch = Arc::clone(batch);
            let task_url = url.clone();
            let limits = self.limits;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                run_task(controller, strategy, task_batch, task_url, limits).await
            });
            active.push(async move { (position, handle.await) });
        }

        while let Some((position, joined)) = active.next().await {
            slots[position] = Some(match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(url = %batch.urls[position], error = %e, "scan task panicked");
                    TaskResult::not_started(batch.urls[position].as_str(), batch.label.as_str(), format!("scan task panicked: {e}"))
                }
            });
        }

        slots
            .into_iter()
            .zip(&batch.urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| TaskResult::not_started(url.as_str(), batch.label.as_str(), "task result missing"))
            })
            .collect()
    }
}
