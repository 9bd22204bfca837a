//! Run counters owned by the scheduler

use std::collections::VecDeque;

use serde::Serialize;

use crate::scheduler::TaskResult;

/// Per-instance progress plus a rolling window of task outcomes
#[derive(Debug, Clone, Serialize)]
pub struct RunCounters {
    /// URLs processed since the last restart
    pub urls_since_cleanup: usize,
    /// URLs processed over the whole run
    pub total_urls: usize,
    /// Most recent outcome last; `true` = success
    recent_outcomes: VecDeque<bool>,
    window: usize,
}

impl RunCounters {
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            urls_since_cleanup: 0,
            total_urls: 0,
            recent_outcomes: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn add_urls(&mut self, count: usize) {
        self.urls_since_cleanup += count;
        self.total_urls += count;
    }

    pub fn record_outcome(&mut self, success: bool) {
        if self.recent_outcomes.len() == self.window {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(success);
    }

    /// Fold a drained batch into the counters, in result order.
    pub fn record_batch(&mut self, results: &[TaskResult]) {
        self.add_urls(results.len());
        for result in results {
            self.record_outcome(result.success);
        }
    }

    /// Called after every restart. `total_urls` survives.
    pub fn reset(&mut self) {
        self.urls_since_cleanup = 0;
        self.recent_outcomes.clear();
    }

    #[must_use]
    pub fn recent_failures(&self) -> usize {
        self.recent_outcomes.iter().filter(|ok| !**ok).count()
    }

    #[must_use]
    pub fn recent_outcomes(&self) -> impl Iterator<Item = bool> + '_ {
        self.recent_outcomes.iter().copied()
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for RunCounters {
    fn default() -> Self {
        Self::new(crate::utils::DEFAULT_FAILURE_WINDOW)
    }
}
