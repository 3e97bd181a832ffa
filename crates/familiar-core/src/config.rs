//! Configuration System
//!
//! Fully-resolved run parameters, loaded from TOML. Every value is absolute:
//! ranges are in space units, costs in fitness units. Converting proportional
//! settings into these values is the caller's job.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::components::world::SpaceMode;
use crate::systems::payoff::GameVariant;

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub population: PopulationConfig,
    pub space: SpaceConfig,
    pub social: SocialConfig,
    pub movement: MovementConfig,
    pub payoff: PayoffConfig,
    pub evolution: EvolutionConfig,
}

/// Population size, founders and lifespans
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Maximum number of live agents (also the founding population size)
    pub capacity: usize,
    /// Fraction of founders that cooperate
    pub initial_cooperator_fraction: f64,
    /// Fitness every newborn starts with
    pub initial_fitness: f64,
    /// Mean lifespan in ticks
    pub min_lifespan: f64,
    /// Squared coefficient of variation of the lifespan draw (0 = fixed)
    pub lifespan_variance: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            initial_cooperator_fraction: 0.5,
            initial_fitness: 0.0,
            min_lifespan: 200.0,
            lifespan_variance: 0.2,
        }
    }
}

/// Spatial layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub mode: SpaceMode,
    /// Side length of the square toroidal space
    pub dims: u32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            mode: SpaceMode::Continuous,
            dims: 100,
        }
    }
}

/// Social memory (base trait values for founders)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Maintain the interaction and familiarity graphs at all
    pub enabled: bool,
    pub familiarity_bias: f64,
    pub memory_capacity: f64,
    pub learning_threshold: f64,
    pub decay_rate: f64,
    /// Variance applied to founder traits (0 = identical founders)
    pub initial_variance: f64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            familiarity_bias: 0.5,
            memory_capacity: 10.0,
            learning_threshold: 2.0,
            decay_rate: 0.1,
            initial_variance: 0.0,
        }
    }
}

/// Movement and partner selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Base view range; agents carry their own copy which may evolve
    pub view_range: f64,
    pub repulse_range: f64,
    pub interact_range: f64,
    /// Pick a random partner within `interact_range` instead of the nearest
    pub random_interaction: bool,
    /// Maximum turn per unit of step size, in degrees
    pub max_rotation_degrees: f64,
    pub step_size: f64,
    /// Discrete: probability of a random move. Continuous: noise std.
    pub error_rate: f64,
    pub flock_weight: f64,
    pub persist_weight: f64,
    pub bounce_on_collision: bool,
    pub always_move: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            view_range: 10.0,
            repulse_range: 1.0,
            interact_range: 2.0,
            random_interaction: false,
            max_rotation_degrees: 30.0,
            step_size: 1.0,
            error_rate: 0.1,
            flock_weight: 0.3,
            persist_weight: 0.3,
            bounce_on_collision: false,
            always_move: false,
        }
    }
}

/// Game played on each interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoffConfig {
    pub game: GameVariant,
    pub cost: f64,
    pub benefit: f64,
    /// Charged as `aggregation_cost * view_range^2`
    pub aggregation_cost: f64,
    /// Added to every agent's fitness each tick (may be negative)
    pub background_fitness: f64,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        Self {
            game: GameVariant::PairwiseCooperation,
            cost: 0.2,
            benefit: 1.0,
            aggregation_cost: 0.0,
            background_fitness: 0.0,
        }
    }
}

/// How the population turns over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReproductionMode {
    /// Agents reproduce and die individually every tick
    #[default]
    Continuous,
    /// The whole population is replaced every `generation_time` ticks
    Generational { generation_time: u64 },
}

/// Reproduction, mutation and selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub enabled: bool,
    pub reproduction: ReproductionMode,
    pub evolve_familiarity: bool,
    pub evolve_cooperation: bool,
    pub evolve_aggregation: bool,
    /// Per-trait mutation probability
    pub mutation_rate: f64,
    /// Std of the view range mutation
    pub aggregation_noise: f64,
    pub reproduction_threshold: f64,
    /// Fraction of the threshold paid on each reproduction attempt
    pub reproduction_cost: f64,
    /// Offspring land within this distance of the parent on each axis
    pub reproduction_radius: f64,
    /// Agents die as soon as their fitness drops below zero
    pub strong_selection: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reproduction: ReproductionMode::Continuous,
            evolve_familiarity: true,
            evolve_cooperation: true,
            evolve_aggregation: false,
            mutation_rate: 0.01,
            aggregation_noise: 0.5,
            reproduction_threshold: 10.0,
            reproduction_cost: 0.5,
            reproduction_radius: 2.0,
            strong_selection: false,
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// True when the population is replaced in synchronous generations.
    pub fn is_generational(&self) -> bool {
        matches!(
            self.evolution.reproduction,
            ReproductionMode::Generational { .. }
        )
    }

    /// Rejects parameter sets the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.population;
        if p.capacity == 0 {
            return Err(ConfigError::invalid("population.capacity", "must be positive"));
        }
        probability("population.initial_cooperator_fraction", p.initial_cooperator_fraction)?;
        if !(p.min_lifespan >= 1.0) {
            return Err(ConfigError::invalid("population.min_lifespan", "must be at least 1"));
        }
        non_negative("population.lifespan_variance", p.lifespan_variance)?;

        if self.space.dims == 0 {
            return Err(ConfigError::invalid("space.dims", "must be positive"));
        }

        let s = &self.social;
        probability("social.familiarity_bias", s.familiarity_bias)?;
        non_negative("social.memory_capacity", s.memory_capacity)?;
        non_negative("social.learning_threshold", s.learning_threshold)?;
        non_negative("social.decay_rate", s.decay_rate)?;
        non_negative("social.initial_variance", s.initial_variance)?;

        let m = &self.movement;
        non_negative("movement.view_range", m.view_range)?;
        non_negative("movement.repulse_range", m.repulse_range)?;
        non_negative("movement.interact_range", m.interact_range)?;
        non_negative("movement.max_rotation_degrees", m.max_rotation_degrees)?;
        non_negative("movement.error_rate", m.error_rate)?;
        probability("movement.flock_weight", m.flock_weight)?;
        probability("movement.persist_weight", m.persist_weight)?;
        if m.flock_weight + m.persist_weight > 1.0 {
            return Err(ConfigError::invalid(
                "movement.flock_weight",
                "flock_weight + persist_weight must not exceed 1",
            ));
        }
        if !(m.step_size > 0.0) {
            return Err(ConfigError::invalid("movement.step_size", "must be positive"));
        }
        if self.space.mode == SpaceMode::Grid && m.error_rate > 1.0 {
            return Err(ConfigError::invalid(
                "movement.error_rate",
                "is a probability on the grid and must not exceed 1",
            ));
        }

        let pay = &self.payoff;
        non_negative("payoff.cost", pay.cost)?;
        non_negative("payoff.benefit", pay.benefit)?;
        non_negative("payoff.aggregation_cost", pay.aggregation_cost)?;
        if !pay.background_fitness.is_finite() {
            return Err(ConfigError::invalid("payoff.background_fitness", "must be finite"));
        }

        let e = &self.evolution;
        probability("evolution.mutation_rate", e.mutation_rate)?;
        non_negative("evolution.aggregation_noise", e.aggregation_noise)?;
        non_negative("evolution.reproduction_threshold", e.reproduction_threshold)?;
        non_negative("evolution.reproduction_cost", e.reproduction_cost)?;
        non_negative("evolution.reproduction_radius", e.reproduction_radius)?;
        if let ReproductionMode::Generational { generation_time } = e.reproduction {
            if generation_time == 0 {
                return Err(ConfigError::invalid(
                    "evolution.reproduction.generation_time",
                    "must be positive",
                ));
            }
        }

        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be a finite, non-negative number"))
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must lie in [0, 1]"))
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error parsing TOML config
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Error writing TOML config
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// A value is out of its allowed range
    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
