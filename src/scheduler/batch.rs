//! Batch and task result types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// URLs for one site sharing one site configuration
///
/// A batch is the cleanup boundary: routine restarts and surface
/// reclamation only happen between batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteBatch {
    pub label: String,
    pub urls: Vec<String>,
    /// Opaque per-site configuration handed to the scan strategy
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl SiteBatch {
    pub fn new(label: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            label: label.into(),
            urls,
            settings: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Outcome of one scan task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub url: String,
    pub batch_label: String,
    pub success: bool,
    /// The browser broke under this task; restart before the next batch
    pub emergency_restart_needed: bool,
    /// Whatever the strategy collected, even on failure
    pub partial_data: serde_json::Value,
    pub error: Option<String>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl TaskResult {
    /// Failed result for a task that never reached a browser.
    pub fn not_started(url: impl Into<String>, batch_label: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            batch_label: batch_label.into(),
            success: false,
            emergency_restart_needed: false,
            partial_data: serde_json::Value::Null,
            error: Some(error.into()),
            elapsed: Duration::ZERO,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}
