//! Lifecycle System
//!
//! Births, deaths and reproduction. Founders are seeded from the base
//! configuration; offspring inherit from a parent with optional mutation.
//! Continuous mode reproduces and kills agents one at a time, generational
//! mode replaces the whole population by fitness-proportional selection.

use familiar_events::{DeathCause, LifecycleEvent};
use tracing::debug;

use crate::components::{Agent, AgentId, MovementKind, Traits, Vec2};
use crate::config::{
    EvolutionConfig, PopulationConfig, ReproductionMode, SimConfig, SocialConfig,
};
use crate::rng::RandomStream;
use crate::simulation::SimulationState;
use crate::systems::payoff::{GameVariant, PayoffEngine};

/// Redraws each trait with probability `rate`.
///
/// Bias and decay are proportions and come from a beta draw with three
/// quarters of the variance; memory and threshold come from a gamma draw.
/// A non-positive variance leaves the traits untouched.
pub fn vary_traits(
    traits: Traits,
    variance: f64,
    rate: f64,
    rng: &mut dyn RandomStream,
) -> Traits {
    if variance <= 0.0 {
        return traits;
    }
    let mut t = traits;
    if rng.bernoulli(rate) {
        t.familiarity_bias = rng.beta(t.familiarity_bias, variance * 0.75);
    }
    if rng.bernoulli(rate) {
        t.memory_capacity = rng.gamma(t.memory_capacity, variance);
    }
    if rng.bernoulli(rate) {
        t.learning_threshold = rng.gamma(t.learning_threshold, variance);
    }
    if rng.bernoulli(rate) {
        t.decay_rate = rng.beta(t.decay_rate, variance * 0.75);
    }
    t
}

/// Cumulative selection weights, shifted so the smallest entry is at least 1.
pub fn selection_table(fitness: &[f64]) -> Vec<f64> {
    let min = fitness.iter().copied().fold(0.0_f64, f64::min);
    let shift = 1.0 - min;
    let mut total = 0.0;
    fitness
        .iter()
        .map(|f| {
            total += f + shift;
            total
        })
        .collect()
}

/// First index whose cumulative weight exceeds `draw`, else the last index.
pub fn select_index(cumulative: &[f64], draw: f64) -> usize {
    cumulative
        .iter()
        .position(|&c| c > draw)
        .unwrap_or_else(|| cumulative.len().saturating_sub(1))
}

/// Birth, death and reproduction rules for one run
#[derive(Debug, Clone)]
pub struct PopulationManager {
    population: PopulationConfig,
    social: SocialConfig,
    evolution: EvolutionConfig,
    base_view_range: f64,
    movement: MovementKind,
    dims: u32,
    background_fitness: f64,
}

/// Everything a newborn needs besides what the registry allocates
struct Birth {
    traits: Traits,
    cooperator: bool,
    view_range: f64,
    position: Vec2,
    parent: Option<AgentId>,
}

impl PopulationManager {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            population: config.population.clone(),
            social: config.social.clone(),
            evolution: config.evolution.clone(),
            base_view_range: config.movement.view_range,
            movement: MovementKind::for_space(config.space.mode),
            dims: config.space.dims,
            background_fitness: config.payoff.background_fitness,
        }
    }

    pub fn base_traits(&self) -> Traits {
        Traits {
            familiarity_bias: self.social.familiarity_bias,
            memory_capacity: self.social.memory_capacity,
            learning_threshold: self.social.learning_threshold,
            decay_rate: self.social.decay_rate,
        }
    }

    /// Gamma-distributed lifespan, truncated to whole ticks, at least 1.
    fn draw_lifespan(&self, rng: &mut dyn RandomStream) -> u32 {
        let drawn = rng.gamma(self.population.min_lifespan, self.population.lifespan_variance);
        (drawn as u32).max(1)
    }

    fn random_position(&self, rng: &mut dyn RandomStream) -> Vec2 {
        let n = self.dims as usize;
        match self.movement {
            MovementKind::Continuous => {
                let d = self.dims as f64;
                let x = rng.uniform() * d;
                Vec2::new(x, rng.uniform() * d)
            }
            MovementKind::Discrete => {
                let x = rng.index(n) as f64;
                Vec2::new(x, rng.index(n) as f64)
            }
        }
    }

    /// A spot within the reproduction radius of `origin`, offset along the
    /// positive direction of each axis.
    fn offspring_position(&self, origin: Vec2, rng: &mut dyn RandomStream) -> Vec2 {
        let r = self.evolution.reproduction_radius;
        let offset = match self.movement {
            MovementKind::Continuous => {
                let dx = rng.uniform() * r;
                Vec2::new(dx, rng.uniform() * r)
            }
            MovementKind::Discrete => {
                let cells = r.max(0.0) as usize;
                let dx = rng.index(cells) as f64;
                Vec2::new(dx, rng.index(cells) as f64)
            }
        };
        origin + offset
    }

    fn spawn(&self, state: &mut SimulationState, birth: Birth) -> AgentId {
        let (id, serial) = state.population.allocate();
        let lifespan = self.draw_lifespan(state.rng.as_mut());
        let heading = self.movement.behavior().initial_heading(state.rng.as_mut());
        let position = state.field.place(id, birth.position);

        state.population.insert(Agent {
            id,
            serial,
            position,
            heading,
            traits: birth.traits,
            view_range: birth.view_range,
            fitness: self.population.initial_fitness,
            age: 0,
            lifespan,
            cooperator: birth.cooperator,
            movement: self.movement,
            interactions_this_tick: 0,
            lifetime_interactions: 0,
            last_partner: None,
            offspring: 0,
        });

        debug!(
            agent = %id,
            parent = ?birth.parent.map(|p| p.0),
            cooperator = birth.cooperator,
            lifespan,
            "agent born"
        );
        state.events.push(LifecycleEvent::Born {
            tick: state.tick,
            agent_id: id.0,
            parent_id: birth.parent.map(|p| p.0),
            cooperator: birth.cooperator,
        });
        id
    }

    /// Seeds the founding population at full capacity.
    pub fn spawn_founders(&self, state: &mut SimulationState) {
        let capacity = self.population.capacity;
        let cooperators = self.population.initial_cooperator_fraction * capacity as f64;
        let base = self.base_traits();
        let head_start = self.evolution.reproduction_threshold - self.population.initial_fitness;

        for i in 0..capacity {
            let traits = vary_traits(base, self.social.initial_variance, 1.0, state.rng.as_mut());
            let position = self.random_position(state.rng.as_mut());
            let id = self.spawn(
                state,
                Birth {
                    traits,
                    cooperator: (i as f64) < cooperators,
                    view_range: self.base_view_range,
                    position,
                    parent: None,
                },
            );

            let lifespan = state.population.get(id).map_or(1, |a| a.lifespan);
            let age = state.rng.index(lifespan as usize) as u32;
            let boost = state.rng.uniform() * head_start;
            if let Some(agent) = state.population.get_mut(id) {
                agent.age = age;
                agent.fitness += boost;
            }
        }
    }

    /// Produces one offspring of `parent`. Returns `None` if the parent is
    /// not alive.
    pub fn reproduce(&self, state: &mut SimulationState, parent: AgentId) -> Option<AgentId> {
        let (traits, cooperator, view_range, origin) = {
            let p = state.population.get_mut(parent)?;
            p.offspring += 1;
            (p.traits, p.cooperator, p.view_range, p.position)
        };
        let evo = &self.evolution;
        let rng = state.rng.as_mut();

        let traits = if evo.evolve_familiarity {
            vary_traits(traits, 1.0, evo.mutation_rate, rng)
        } else if self.social.initial_variance > 0.0 {
            vary_traits(self.base_traits(), self.social.initial_variance, 1.0, rng)
        } else {
            traits
        };

        let cooperator = if evo.evolve_cooperation {
            cooperator ^ rng.bernoulli(evo.mutation_rate)
        } else {
            rng.bernoulli(self.population.initial_cooperator_fraction)
        };

        let position = self.offspring_position(origin, rng);

        let view_range = if evo.evolve_aggregation {
            rng.clamped_gaussian(view_range, evo.aggregation_noise, 1.0, f64::MAX)
        } else {
            view_range
        };

        Some(self.spawn(
            state,
            Birth {
                traits,
                cooperator,
                view_range,
                position,
                parent: Some(parent),
            },
        ))
    }

    /// Removes an agent from the field, both graphs and the registry.
    pub fn kill(&self, state: &mut SimulationState, id: AgentId, cause: DeathCause) {
        state.field.remove(id);
        state.social.remove_agent(id);
        let Some(agent) = state.population.remove(id) else {
            return;
        };
        debug!(agent = %id, ?cause, age = agent.age, offspring = agent.offspring, "agent died");
        state.events.push(LifecycleEvent::Died {
            tick: state.tick,
            agent_id: id.0,
            cause,
            age: agent.age,
            offspring: agent.offspring,
            interactions: agent.lifetime_interactions,
        });
    }

    /// End-of-step evolution for one agent: background fitness, then in
    /// continuous mode ageing, reproduction and death.
    pub fn evolve(&self, state: &mut SimulationState, id: AgentId) {
        let Some(agent) = state.population.get_mut(id) else {
            return;
        };
        agent.fitness += self.background_fitness;

        let evo = &self.evolution;
        if !evo.enabled || evo.reproduction != ReproductionMode::Continuous {
            return;
        }

        agent.age += 1;
        let threshold = evo.reproduction_threshold;
        let mut wants_offspring = false;
        if agent.fitness >= threshold {
            agent.fitness -= threshold * evo.reproduction_cost;
            wants_offspring = true;
        }

        if wants_offspring && !state.population.is_full() {
            self.reproduce(state, id);
        }

        let cause = match state.population.get(id) {
            Some(a) if a.is_expired() => Some(DeathCause::OldAge),
            Some(a) if evo.strong_selection && a.fitness < 0.0 => Some(DeathCause::Starvation),
            _ => None,
        };
        if let Some(cause) = cause {
            self.kill(state, id, cause);
        }
    }

    /// True when a generation ends at the close of `tick`.
    pub fn generation_due(&self, tick: u64) -> bool {
        match self.evolution.reproduction {
            ReproductionMode::Generational { generation_time }
                if self.evolution.enabled && generation_time > 0 =>
            {
                (tick + 1) % generation_time == 0
            }
            _ => false,
        }
    }

    /// Replaces the whole population by fitness-proportional selection.
    pub fn replace_generation(&self, state: &mut SimulationState, payoff: &PayoffEngine) {
        if state.population.is_empty() {
            return;
        }

        if payoff.game() == GameVariant::PublicGoods {
            for id in state.population.ids() {
                let idle = state
                    .population
                    .get(id)
                    .map_or(false, |a| !a.has_interacted());
                if idle {
                    payoff.public_goods(id, &mut state.population, &state.field);
                }
            }
        }

        let parents = state.population.ids();
        let fitness: Vec<f64> = parents
            .iter()
            .filter_map(|&id| state.population.get(id).map(|a| a.fitness))
            .collect();
        let cumulative = selection_table(&fitness);
        let total = cumulative.last().copied().unwrap_or(0.0);

        for _ in 0..self.population.capacity {
            let draw = state.rng.uniform() * total;
            let parent = parents[select_index(&cumulative, draw)];
            self.reproduce(state, parent);
        }

        for id in parents {
            self.kill(state, id, DeathCause::Replaced);
        }

        state.generation += 1;
        debug!(
            tick = state.tick,
            generation = state.generation,
            population = state.population.len(),
            "generation replaced"
        );
        state.events.push(LifecycleEvent::GenerationReplaced {
            tick: state.tick,
            generation: state.generation,
            population: state.population.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededStream;

    #[test]
    fn test_selection_example() {
        let cumulative = selection_table(&[1.0, 2.0, 3.0]);
        assert_eq!(cumulative, vec![2.0, 5.0, 9.0]);
        assert_eq!(select_index(&cumulative, 4.9), 1);
        assert_eq!(select_index(&cumulative, 0.5), 0);
        assert_eq!(select_index(&cumulative, 9.0), 2);
    }

    #[test]
    fn test_selection_shifts_negative_fitness() {
        let cumulative = selection_table(&[-3.0, 0.0]);
        // shift = 1 - (-3) = 4
        assert_eq!(cumulative, vec![1.0, 5.0]);
    }

    #[test]
    fn test_vary_traits_zero_variance_is_identity() {
        let mut rng = SeededStream::new(5);
        let t = Traits::default();
        assert_eq!(vary_traits(t, 0.0, 1.0, &mut rng), t);
    }

    #[test]
    fn test_vary_traits_zero_rate_is_identity() {
        let mut rng = SeededStream::new(5);
        let t = Traits::default();
        assert_eq!(vary_traits(t, 0.5, 0.0, &mut rng), t);
    }

    #[test]
    fn test_vary_traits_keeps_bias_in_unit_interval() {
        let mut rng = SeededStream::new(6);
        for _ in 0..500 {
            let t = vary_traits(Traits::default(), 1.0, 1.0, &mut rng);
            assert!((0.0..=1.0).contains(&t.familiarity_bias));
            assert!((0.0..=1.0).contains(&t.decay_rate));
            assert!(t.memory_capacity >= 0.0);
            assert!(t.learning_threshold >= 0.0);
        }
    }

    fn state_with(config: &SimConfig) -> (SimulationState, PopulationManager) {
        let state = SimulationState::new(config, Box::new(SeededStream::new(17)));
        (state, PopulationManager::new(config))
    }

    #[test]
    fn test_lifespan_draw_truncates() {
        let mut config = SimConfig::default();
        config.population.min_lifespan = 7.9;
        config.population.lifespan_variance = 0.0;
        let (mut state, manager) = state_with(&config);
        assert_eq!(manager.draw_lifespan(state.rng.as_mut()), 7);

        config.population.min_lifespan = 1.0;
        let manager = PopulationManager::new(&config);
        assert_eq!(manager.draw_lifespan(state.rng.as_mut()), 1);
    }

    #[test]
    fn test_founders_fill_capacity() {
        let mut config = SimConfig::default();
        config.population.capacity = 10;
        config.population.initial_cooperator_fraction = 0.3;
        let (mut state, manager) = state_with(&config);

        manager.spawn_founders(&mut state);

        assert_eq!(state.population.len(), 10);
        assert_eq!(state.field.len(), 10);
        assert_eq!(state.population.cooperators(), 3);
        for agent in state.population.iter() {
            assert!(agent.lifespan >= 1);
            assert!(agent.age < agent.lifespan.max(1));
            assert_eq!(agent.cooperator, agent.id.0 < 3);
        }
        assert_eq!(state.events.len(), 10);
    }

    #[test]
    fn test_reproduce_places_near_parent_and_counts_offspring() {
        let mut config = SimConfig::default();
        config.population.capacity = 2;
        config.evolution.reproduction_radius = 2.0;
        config.evolution.mutation_rate = 0.0;
        let (mut state, manager) = state_with(&config);
        manager.spawn_founders(&mut state);
        let parent = AgentId(0);
        let origin = state.population.get(parent).unwrap().position;

        let child = manager.reproduce(&mut state, parent).unwrap();

        let p = state.population.get(parent).unwrap();
        let c = state.population.get(child).unwrap();
        assert_eq!(p.offspring, 1);
        assert_eq!(c.traits, p.traits);
        assert_eq!(c.cooperator, p.cooperator);
        let offset = state.field.delta(origin, c.position);
        assert!((0.0..2.0).contains(&offset.x));
        assert!((0.0..2.0).contains(&offset.y));
    }

    #[test]
    fn test_kill_clears_everything() {
        let mut config = SimConfig::default();
        config.population.capacity = 3;
        let (mut state, manager) = state_with(&config);
        manager.spawn_founders(&mut state);
        let traits = Traits {
            learning_threshold: 0.0,
            ..Traits::default()
        };
        state.social.record_interaction(AgentId(0), AgentId(1), &traits);
        state.social.record_interaction(AgentId(1), AgentId(0), &traits);
        state.social.record_interaction(AgentId(2), AgentId(1), &traits);

        manager.kill(&mut state, AgentId(1), DeathCause::OldAge);

        assert!(!state.population.contains(AgentId(1)));
        assert!(state.field.position(AgentId(1)).is_none());
        assert_eq!(state.social.familiarity_edge_count(), 0);
        assert_eq!(state.social.interaction().edge_count(), 0);
        assert!(matches!(
            state.events.last(),
            Some(LifecycleEvent::Died { agent_id: 1, cause: DeathCause::OldAge, .. })
        ));
    }

    #[test]
    fn test_evolve_pays_for_reproduction_even_when_full() {
        let mut config = SimConfig::default();
        config.population.capacity = 1;
        config.population.min_lifespan = 1000.0;
        config.population.lifespan_variance = 0.0;
        let (mut state, manager) = state_with(&config);
        manager.spawn_founders(&mut state);
        let id = AgentId(0);
        state.population.get_mut(id).unwrap().fitness = 10.0;

        manager.evolve(&mut state, id);

        let agent = state.population.get(id).unwrap();
        assert_eq!(agent.fitness, 5.0);
        assert_eq!(agent.offspring, 0);
        assert_eq!(state.population.len(), 1);
    }

    #[test]
    fn test_strong_selection_kills_negative_fitness() {
        let mut config = SimConfig::default();
        config.population.capacity = 1;
        config.population.min_lifespan = 1000.0;
        config.population.lifespan_variance = 0.0;
        config.evolution.strong_selection = true;
        config.payoff.background_fitness = -1.0;
        let (mut state, manager) = state_with(&config);
        manager.spawn_founders(&mut state);
        state.population.get_mut(AgentId(0)).unwrap().fitness = 0.5;

        manager.evolve(&mut state, AgentId(0));

        assert!(state.population.is_empty());
        assert!(matches!(
            state.events.last(),
            Some(LifecycleEvent::Died { cause: DeathCause::Starvation, .. })
        ));
    }

    #[test]
    fn test_generation_replacement() {
        let mut config = SimConfig::default();
        config.population.capacity = 5;
        config.evolution.reproduction = ReproductionMode::Generational { generation_time: 10 };
        let (mut state, manager) = state_with(&config);
        manager.spawn_founders(&mut state);
        let payoff = PayoffEngine::new(config.payoff.clone(), false, config.movement.interact_range);

        assert!(!manager.generation_due(0));
        assert!(manager.generation_due(9));

        manager.replace_generation(&mut state, &payoff);

        assert_eq!(state.population.len(), 5);
        assert!(state.population.iter().all(|a| a.id.0 >= 5));
        assert_eq!(state.generation, 1);
        assert_eq!(state.social.familiarity_edge_count(), 0);
    }
}
