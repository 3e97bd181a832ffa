//! Simulation Systems
//!
//! Movement, payoff and lifecycle rules applied by the stepper.

pub mod lifecycle;
pub mod movement;
pub mod payoff;

pub use lifecycle::{select_index, selection_table, vary_traits, PopulationManager};
pub use movement::{
    limit_turn, ContinuousMovement, DiscreteMovement, MovePlan, MovementContext, SpatialBehavior,
};
pub use payoff::{gather_group, GameVariant, PayoffEngine};
