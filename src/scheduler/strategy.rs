//! Pluggable per-URL scan logic

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use super::batch::SiteBatch;
use crate::browser::{DriverError, Surface};

#[derive(Debug, Error)]
pub enum ScanError {
    /// The browser failed underneath the strategy
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The strategy gave up; whatever it collected is kept
    #[error("scan failed: {message}")]
    Failed { message: String, partial: Value },
}

impl ScanError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            partial: Value::Null,
        }
    }

    /// Data collected before the failure
    #[must_use]
    pub fn partial(&self) -> Value {
        match self {
            Self::Failed { partial, .. } => partial.clone(),
            Self::Driver(_) => Value::Null,
        }
    }

    /// Driver errors with a fatal signature mean the browser itself broke.
    #[must_use]
    pub fn is_browser_fatal(&self) -> bool {
        matches!(self, Self::Driver(e) if e.fatal_kind().is_some())
    }
}

/// What a scan task does with the surface it was given
#[async_trait]
pub trait ScanStrategy: Send + Sync {
    async fn scan(&self, surface: &dyn Surface, url: &str, batch: &SiteBatch) -> Result<Value, ScanError>;
}

/// Navigate and report where the page ended up
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateScan;

const PAGE_IDENTITY_SCRIPT: &str = "({ final_url: location.href, title: document.title })";

#[async_trait]
impl ScanStrategy for NavigateScan {
    async fn scan(&self, surface: &dyn Surface, url: &str, _batch: &SiteBatch) -> Result<Value, ScanError> {
        surface.navigate(url).await?;
        let identity = surface.evaluate(PAGE_IDENTITY_SCRIPT).await.map_err(|e| {
            if e.fatal_kind().is_some() {
                ScanError::Driver(e)
            } else {
                ScanError::Failed {
                    message: format!("page identity probe failed: {e}"),
                    partial: json!({ "url": url }),
                }
            }
        })?;

        Ok(json!({
            "url": url,
            "final_url": identity.get("final_url").cloned().unwrap_or(Value::Null),
            "title": identity.get("title").cloned().unwrap_or(Value::Null),
        }))
    }
}
