//! Restart decision policy
//!
//! Pure functions over a [`HealthReport`](crate::health::HealthReport) and
//! the scheduler's [`RunCounters`].

mod counters;
mod decision;

pub use counters::RunCounters;
pub use decision::{RestartDecision, RestartReason, RestartThresholds, decide};
