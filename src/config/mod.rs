//! Configuration for fleet runs
//!
//! `FleetConfig` holds every tunable with serde defaults; the builder
//! validates, and the derived views hand each component only what it needs.

pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

pub use builder::FleetConfigBuilder;
pub use types::FleetConfig;
