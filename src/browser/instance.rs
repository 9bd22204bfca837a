//! The scheduler's view of one browser-controller process

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::driver::{BrowserController, Surface};
use super::error::DriverError;

/// A launched controller plus fleet metadata
///
/// Exactly one instance is current at a time. Tasks only ever get a clone of
/// the controller handle and drop it when they finish; the instance itself
/// stays with the scheduler until it is handed to the escalation manager.
#[derive(Clone)]
pub struct BrowserInstance {
    id: u64,
    controller: Arc<dyn BrowserController>,
    created_at: Instant,
}

impl BrowserInstance {
    pub fn new(id: u64, controller: Arc<dyn BrowserController>) -> Self {
        Self {
            id,
            controller,
            created_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.controller.pid()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.controller.is_connected()
    }

    #[must_use]
    pub fn profile_dir(&self) -> Option<&Path> {
        self.controller.profile_dir()
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Shared handle for a task; must not outlive the task.
    #[must_use]
    pub fn controller(&self) -> Arc<dyn BrowserController> {
        Arc::clone(&self.controller)
    }

    pub async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, DriverError> {
        self.controller.surfaces().await
    }

    /// Whether the process is attached and the transport is up.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.pid().is_some() && self.is_connected()
    }
}

impl std::fmt::Debug for BrowserInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserInstance")
            .field("id", &self.id)
            .field("pid", &self.pid())
            .field("connected", &self.is_connected())
            .field("profile_dir", &self.profile_dir())
            .field("age", &self.age())
            .finish()
    }
}
