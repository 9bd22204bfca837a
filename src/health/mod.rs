//! Health assessment engine
//!
//! Turns a set of bounded-time probes against one browser instance into a
//! [`HealthReport`]. The restart policy reads the report; nothing here
//! decides anything.

mod assessor;
mod report;

pub use assessor::{HealthAssessor, HealthOptions};
pub use report::{Connectivity, HealthReport, HealthStatus, Recommendation};
