//! Output Generation
//!
//! Telemetry snapshots, rendering views and the lifecycle event log.

pub mod logger;
pub mod telemetry;

pub use logger::EventLogger;
pub use telemetry::*;
