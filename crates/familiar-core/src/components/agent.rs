//! Agent Components
//!
//! The per-individual record: heritable traits, phenotype, fitness and the
//! bookkeeping the stepper needs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::world::Vec2;

/// Identifier of a live agent. Ids are reused only after full removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{:04}", self.0)
    }
}

/// Weak reference to an agent: id plus birth serial.
///
/// Resolves only while the same individual is alive, even if the id has
/// since been recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentHandle {
    pub id: AgentId,
    pub serial: u64,
}

/// Heritable social-memory traits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Weight given to familiar individuals in movement (0.0 to 1.0)
    pub familiarity_bias: f64,
    /// Maximum number of familiar individuals
    pub memory_capacity: f64,
    /// Interaction weight an edge must exceed to become familiar
    pub learning_threshold: f64,
    /// Interaction weight lost per tick
    pub decay_rate: f64,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            familiarity_bias: 0.5,
            memory_capacity: 10.0,
            learning_threshold: 2.0,
            decay_rate: 0.1,
        }
    }
}

/// Which movement rule an agent follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Discrete,
    Continuous,
}

/// A live individual
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    /// Monotonic birth number; validates handles
    pub serial: u64,
    pub position: Vec2,
    /// Last movement direction. Unit vector in continuous space, a compass
    /// step with components in {-1, 0, 1} on the grid.
    pub heading: Vec2,
    pub traits: Traits,
    pub view_range: f64,
    pub fitness: f64,
    pub age: u32,
    pub lifespan: u32,
    pub cooperator: bool,
    pub movement: MovementKind,
    pub interactions_this_tick: u32,
    pub lifetime_interactions: u64,
    pub last_partner: Option<AgentHandle>,
    pub offspring: u32,
}

impl Agent {
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            id: self.id,
            serial: self.serial,
        }
    }

    pub fn has_interacted(&self) -> bool {
        self.interactions_this_tick > 0
    }

    /// Counts an encounter with `partner` and remembers it as the last one.
    pub fn record_partner(&mut self, partner: AgentHandle) {
        self.interactions_this_tick += 1;
        self.lifetime_interactions += 1;
        self.last_partner = Some(partner);
    }

    /// Counts membership in a public goods group.
    pub fn join_group(&mut self) {
        self.interactions_this_tick += 1;
        self.lifetime_interactions += 1;
    }

    pub fn is_expired(&self) -> bool {
        self.age > self.lifespan
    }
}
