//! Familiarity Simulation Core
//!
//! Evolution of familiarity bias, cooperation and spatial aggregation in a
//! population of moving agents with bounded social memory.
//!
//! The stepper in [`simulation`] drives the systems in [`systems`] over the
//! state in [`components`]. All randomness flows through one
//! [`rng::RandomStream`], so a run is reproducible from its seed.

pub mod components;
pub mod config;
pub mod error;
pub mod output;
pub mod rng;
pub mod simulation;
pub mod systems;

pub use components::{Agent, AgentHandle, AgentId, SpaceMode, Traits, Vec2};
pub use config::{ConfigError, ReproductionMode, SimConfig};
pub use error::{SimError, SimResult};
pub use rng::{RandomStream, SeededStream};
pub use simulation::{Simulation, SimulationState};
pub use systems::GameVariant;
