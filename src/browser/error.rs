//! Driver error types and the fatal-signature taxonomy
//!
//! Raw driver errors are classified exactly once, when they cross into this
//! crate (`DriverError::from_cdp`). Everything deeper in the call stack reads
//! the stored `FatalErrorKind` instead of re-matching message text.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Known-fatal failure signatures of a browser controller.
///
/// Any of these means the controller can no longer be trusted and must be
/// recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalErrorKind {
    /// CDP request/response stream out of sync ("Protocol error")
    ProtocolDesync,
    /// Session detached underneath us
    SessionClosed,
    /// Target (tab or browser) closed underneath us
    TargetClosed,
    /// Transport connection dropped
    ConnectionClosed,
    /// Renderer process crashed
    RendererCrash,
    /// A network-subsystem command timed out inside the browser
    NetworkTimeout,
    /// A health probe exceeded its own deadline
    ProbeTimeout,
}

impl FatalErrorKind {
    /// Classify a raw driver error message.
    ///
    /// Order matters: "Protocol error (Target.closeTarget): Target closed"
    /// is a closed target, not a desync.
    #[must_use]
    pub fn classify(message: &str) -> Option<Self> {
        let msg = message.to_lowercase();

        if msg.contains("target closed") || msg.contains("no target with given id") {
            return Some(Self::TargetClosed);
        }
        if msg.contains("session closed") || msg.contains("session with given id not found") {
            return Some(Self::SessionClosed);
        }
        if msg.contains("page crashed")
            || msg.contains("target crashed")
            || msg.contains("renderer crash")
        {
            return Some(Self::RendererCrash);
        }
        if msg.contains("network.enable timed out")
            || msg.contains("fetch.enable timed out")
            || msg.contains("runtime.callfunctionon timed out")
            || msg.contains("network service crashed")
        {
            return Some(Self::NetworkTimeout);
        }
        if msg.contains("connection closed")
            || msg.contains("connection terminated")
            || msg.contains("websocket")
            || msg.contains("receiver is gone")
            || msg.contains("channel closed")
        {
            return Some(Self::ConnectionClosed);
        }
        if msg.contains("protocol error") {
            return Some(Self::ProtocolDesync);
        }

        None
    }
}

impl fmt::Display for FatalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ProtocolDesync => "protocol desync",
            Self::SessionClosed => "session closed",
            Self::TargetClosed => "target closed",
            Self::ConnectionClosed => "connection closed",
            Self::RendererCrash => "renderer crash",
            Self::NetworkTimeout => "network subsystem timeout",
            Self::ProbeTimeout => "probe timeout",
        };
        f.write_str(label)
    }
}

/// Errors returned by the browser driver seam
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// A CDP command failed; `fatal` is the classification of `message`
    #[error("CDP error: {message}")]
    Cdp {
        message: String,
        fatal: Option<FatalErrorKind>,
    },

    /// Our own deadline around a driver operation expired
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Browser process could not be started
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Controller no longer has a process or connection
    #[error("browser controller is gone")]
    Gone,

    /// Local I/O around the browser process failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl DriverError {
    /// Build a CDP error, classifying the message once.
    pub fn from_cdp(message: impl Into<String>) -> Self {
        let message = message.into();
        let fatal = FatalErrorKind::classify(&message);
        Self::Cdp { message, fatal }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Fatal kind recorded when this error was created.
    ///
    /// Timeouts of our own deadlines are not fatal here; the health engine
    /// decides for itself whether a probe timeout counts.
    #[must_use]
    pub fn fatal_kind(&self) -> Option<FatalErrorKind> {
        match self {
            Self::Cdp { fatal, .. } => *fatal,
            Self::Gone => Some(FatalErrorKind::ConnectionClosed),
            Self::Timeout { .. } | Self::Launch(_) | Self::Io(_) => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::from_cdp(err.to_string())
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
