//! Run-level and configuration errors

use thiserror::Error;

use crate::scheduler::RunSummary;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency must be between 1 and {max}, got {value}")]
    Concurrency { value: usize, max: usize },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid process pattern '{pattern}': {reason}")]
    ProcessPattern { pattern: String, reason: String },

    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every launch attempt failed
    #[error("browser launch failed after {attempts} attempts: {reason}")]
    Launch { attempts: u32, reason: String },

    /// All escalation tiers ran and the instance is still alive. The run
    /// itself finished; `summary` holds its totals.
    #[error("cleanup failed: browser instance {instance_id} could not be terminated")]
    CleanupFailed {
        instance_id: u64,
        summary: Box<RunSummary>,
    },
}
