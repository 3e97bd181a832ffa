//! Snapshot Types
//!
//! Read-only telemetry and rendering views of the simulation.
//!
//! A `PopulationSnapshot` carries the aggregate counters used for analysis;
//! a `WorldView` carries what a renderer needs (positions, phenotypes and the
//! familiarity edge set).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Running totals for one cooperation phenotype (defectors or cooperators).
///
/// The `*_sum` trait fields cover live agents only; the `lifetime_*` fields
/// accumulate over every agent of this phenotype that has died.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeTotals {
    pub live: usize,
    pub familiarity_bias_sum: f64,
    pub memory_capacity_sum: f64,
    pub learning_threshold_sum: f64,
    pub decay_rate_sum: f64,
    pub view_range_sum: f64,
    pub dead: u64,
    pub lifetime_interactions: u64,
    pub lifetime_offspring: u64,
    pub lifetime_age: u64,
}

impl PhenotypeTotals {
    fn per_live(&self, sum: f64) -> f64 {
        if self.live == 0 {
            0.0
        } else {
            sum / self.live as f64
        }
    }

    fn per_dead(&self, sum: u64) -> f64 {
        if self.dead == 0 {
            0.0
        } else {
            sum as f64 / self.dead as f64
        }
    }

    pub fn mean_familiarity_bias(&self) -> f64 {
        self.per_live(self.familiarity_bias_sum)
    }

    pub fn mean_memory_capacity(&self) -> f64 {
        self.per_live(self.memory_capacity_sum)
    }

    pub fn mean_learning_threshold(&self) -> f64 {
        self.per_live(self.learning_threshold_sum)
    }

    pub fn mean_decay_rate(&self) -> f64 {
        self.per_live(self.decay_rate_sum)
    }

    pub fn mean_view_range(&self) -> f64 {
        self.per_live(self.view_range_sum)
    }

    /// Average lifetime interactions of dead agents
    pub fn mean_interactions(&self) -> f64 {
        self.per_dead(self.lifetime_interactions)
    }

    /// Average offspring of dead agents
    pub fn mean_fecundity(&self) -> f64 {
        self.per_dead(self.lifetime_offspring)
    }

    /// Average age at death
    pub fn mean_survival(&self) -> f64 {
        self.per_dead(self.lifetime_age)
    }
}

/// Aggregate counters sampled at one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub snapshot_id: String,
    pub run_id: Uuid,
    pub tick: u64,
    pub population: usize,
    pub cooperators: usize,
    pub familiarity_edges: usize,
    pub familiarity_weight: f64,
    /// Mean local clustering coefficient of the familiarity graph, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustering: Option<f64>,
    pub defector_totals: PhenotypeTotals,
    pub cooperator_totals: PhenotypeTotals,
}

impl PopulationSnapshot {
    /// Mean weight of a familiarity edge (0 when there are none)
    pub fn mean_familiarity(&self) -> f64 {
        if self.familiarity_edges == 0 {
            0.0
        } else {
            self.familiarity_weight / self.familiarity_edges as f64
        }
    }

    /// Mean number of familiar individuals per agent
    pub fn mean_familiar_count(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.familiarity_edges as f64 / self.population as f64
        }
    }

    pub fn cooperator_fraction(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.cooperators as f64 / self.population as f64
        }
    }

    /// Serializes the snapshot to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One agent as seen by a renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub agent_id: u32,
    pub x: f64,
    pub y: f64,
    pub heading: [f64; 2],
    pub cooperator: bool,
    pub familiarity_bias: f64,
    pub view_range: f64,
    pub fitness: f64,
    pub age: u32,
}

/// A directed familiarity edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamiliarityEdgeView {
    pub from: u32,
    pub to: u32,
    pub weight: f64,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldView {
    pub tick: u64,
    pub dims: u32,
    pub continuous: bool,
    pub agents: Vec<AgentView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub familiarity_edges: Vec<FamiliarityEdgeView>,
}
