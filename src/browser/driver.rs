//! Browser driver seam
//!
//! The orchestrator never talks to a concrete automation library directly.
//! It drives a [`BrowserController`] and the [`Surface`]s it hands out, and
//! obtains fresh controllers from a [`BrowserLauncher`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::error::DriverError;

/// Runtime metrics reported by one surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SurfaceMetrics {
    /// Used JS heap in bytes
    pub js_heap_used_bytes: u64,
    /// Live DOM node count
    pub dom_nodes: u64,
    /// Registered JS event listeners
    pub event_listeners: u64,
}

/// One browsing context (tab)
#[async_trait]
pub trait Surface: Send + Sync {
    /// Stable identifier (target id for CDP drivers)
    fn id(&self) -> String;

    /// Navigate and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Evaluate a JS expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError>;

    /// Turn request interception on or off.
    async fn set_request_interception(&self, enabled: bool) -> Result<(), DriverError>;

    async fn metrics(&self) -> Result<SurfaceMetrics, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// A live browser-controller process and its transport connection
#[async_trait]
pub trait BrowserController: Send + Sync {
    /// OS process id, if a process is attached
    fn pid(&self) -> Option<u32>;

    /// Transport-level connection flag
    fn is_connected(&self) -> bool;

    /// Isolated profile directory owned by this controller
    fn profile_dir(&self) -> Option<&Path>;

    /// Version/identity string; the cheapest protocol round-trip.
    async fn version(&self) -> Result<String, DriverError>;

    /// Open surfaces, main/default surface first.
    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, DriverError>;

    async fn open_surface(&self) -> Result<Arc<dyn Surface>, DriverError>;

    /// Request a normal shutdown and wait for the process to exit.
    async fn close(&self) -> Result<(), DriverError>;

    /// Release the transport handle without touching the process.
    fn disconnect(&self);
}

/// Factory for fresh controllers
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserController>, DriverError>;
}
