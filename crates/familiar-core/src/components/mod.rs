//! Simulation State Components
//!
//! Agents, the spatial field, the social graph and the population registry.

pub mod agent;
pub mod population;
pub mod social;
pub mod world;

pub use agent::*;
pub use population::*;
pub use social::*;
pub use world::*;
