//! Run-level tallies

use serde::Serialize;

use super::batch::TaskResult;
use super::window_cleanup::ReclaimReport;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub batches: usize,
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub routine_restarts: usize,
    pub emergency_restarts: usize,
    /// Instances that survived every escalation tier
    pub failed_terminations: usize,
    pub launch_failures: usize,
    pub surfaces_reclaimed: usize,
    pub estimated_bytes_reclaimed: u64,
}

impl RunSummary {
    pub(crate) fn record_batch(&mut self, results: &[TaskResult]) {
        self.batches += 1;
        self.tasks += results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        self.succeeded += succeeded;
        self.failed += results.len() - succeeded;
    }

    pub(crate) fn record_reclaim(&mut self, report: &ReclaimReport) {
        self.surfaces_reclaimed += report.closed;
        self.estimated_bytes_reclaimed += report.estimated_bytes;
    }

    #[must_use]
    pub fn restarts(&self) -> usize {
        self.routine_restarts + self.emergency_restarts
    }
}
