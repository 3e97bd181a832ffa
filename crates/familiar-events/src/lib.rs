//! Shared telemetry and lifecycle types for the familiarity simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! The core crate produces them; drivers, reports and renderers consume them.

pub mod event;
pub mod snapshot;

// Re-export event types
pub use event::{DeathCause, EventType, LifecycleEvent};

// Re-export snapshot types
pub use snapshot::{
    generate_snapshot_id, AgentView, FamiliarityEdgeView, PhenotypeTotals, PopulationSnapshot,
    WorldView,
};
