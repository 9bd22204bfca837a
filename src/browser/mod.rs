//! Browser driver seam, the chromium implementation, and instance handles

pub mod chromium;
pub mod driver;
pub mod error;
pub mod instance;
pub mod profile;

pub use chromium::{ChromiumLauncher, ChromiumSettings};
pub use driver::{BrowserController, BrowserLauncher, Surface, SurfaceMetrics};
pub use error::{DriverError, FatalErrorKind};
pub use instance::BrowserInstance;
