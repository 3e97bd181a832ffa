//! Simulation Stepper
//!
//! Owns the run state and advances it one tick at a time. Every live agent
//! is stepped once per tick in ascending id order: decay, move, interact,
//! evolve. Agents born during a tick wait for the next one; agents that die
//! before their turn are skipped.

use familiar_events::{LifecycleEvent, PopulationSnapshot, WorldView};
use tracing::{info, trace};
use uuid::Uuid;

use crate::components::{AgentHandle, AgentId, Population, SocialGraph, SpatialField};
use crate::config::SimConfig;
use crate::error::SimResult;
use crate::output::telemetry;
use crate::rng::{RandomStream, SeededStream};
use crate::systems::lifecycle::PopulationManager;
use crate::systems::movement::{MovePlan, MovementContext};
use crate::systems::payoff::PayoffEngine;

/// Mutable world state shared by all systems
pub struct SimulationState {
    pub tick: u64,
    /// Completed generation replacements
    pub generation: u64,
    pub population: Population,
    pub field: SpatialField,
    pub social: SocialGraph,
    pub rng: Box<dyn RandomStream>,
    /// Lifecycle events not yet drained by the driver
    pub events: Vec<LifecycleEvent>,
}

impl SimulationState {
    /// Empty world sized for `config`.
    pub fn new(config: &SimConfig, rng: Box<dyn RandomStream>) -> Self {
        Self {
            tick: 0,
            generation: 0,
            population: Population::new(config.population.capacity, !config.is_generational()),
            field: SpatialField::new(config.space.mode, config.space.dims),
            social: SocialGraph::new(),
            rng,
            events: Vec::new(),
        }
    }
}

/// A configured, seeded run
pub struct Simulation {
    config: SimConfig,
    run_id: Uuid,
    state: SimulationState,
    manager: PopulationManager,
    payoff: PayoffEngine,
    snapshot_seq: u64,
}

impl Simulation {
    /// Validates the configuration and seeds the founding population.
    pub fn new(config: SimConfig, seed: u64) -> SimResult<Self> {
        Self::with_stream(config, Box::new(SeededStream::new(seed)))
    }

    /// Like [`Simulation::new`] but draws from the given stream.
    pub fn with_stream(config: SimConfig, rng: Box<dyn RandomStream>) -> SimResult<Self> {
        config.validate()?;

        let manager = PopulationManager::new(&config);
        let payoff = PayoffEngine::new(
            config.payoff.clone(),
            config.evolution.evolve_aggregation,
            config.movement.interact_range,
        );
        let mut state = SimulationState::new(&config, rng);
        manager.spawn_founders(&mut state);

        let sim = Self {
            run_id: Uuid::new_v4(),
            config,
            state,
            manager,
            payoff,
            snapshot_seq: 0,
        };
        info!(
            run_id = %sim.run_id,
            population = sim.state.population.len(),
            space = ?sim.config.space.mode,
            game = ?sim.config.payoff.game,
            "simulation initialized"
        );
        Ok(sim)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Takes the lifecycle events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.state.events)
    }

    /// Advances the world by one tick.
    pub fn step(&mut self) {
        let Self {
            config,
            state,
            manager,
            payoff,
            ..
        } = self;

        for agent in state.population.iter_mut() {
            agent.interactions_this_tick = 0;
        }

        for handle in state.population.handles() {
            step_agent(config, state, manager, payoff, handle);
        }

        if manager.generation_due(state.tick) {
            manager.replace_generation(state, payoff);
        }

        trace!(
            tick = state.tick,
            population = state.population.len(),
            cooperators = state.population.cooperators(),
            familiar_edges = state.social.familiarity_edge_count(),
            "tick complete"
        );
        state.tick += 1;
    }

    /// Runs `ticks` steps.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Aggregate telemetry for the current tick. Clustering is a full scan
    /// of the familiarity graph and is only computed on request.
    pub fn snapshot(&mut self, with_clustering: bool) -> PopulationSnapshot {
        self.snapshot_seq += 1;
        telemetry::population_snapshot(&self.state, self.run_id, self.snapshot_seq, with_clustering)
    }

    /// Positions, phenotypes and optionally the familiarity edges.
    pub fn world_view(&self, with_edges: bool) -> WorldView {
        telemetry::world_view(&self.state, with_edges)
    }
}

fn step_agent(
    config: &SimConfig,
    state: &mut SimulationState,
    manager: &PopulationManager,
    payoff: &PayoffEngine,
    handle: AgentHandle,
) {
    let Some(agent) = state.population.resolve(handle) else {
        return;
    };
    let id = agent.id;
    let decay_rate = agent.traits.decay_rate;

    if config.social.enabled {
        state.social.decay(id, decay_rate);
    }

    let Some(plan) = plan_move(config, state, id) else {
        return;
    };

    let destination = state.field.relocate(id, plan.destination);
    if let Some(agent) = state.population.get_mut(id) {
        agent.position = destination;
        agent.heading = plan.heading;
    }

    if let Some(partner) = plan.partner {
        interact(config, state, payoff, id, partner);
    }

    manager.evolve(state, id);
}

fn plan_move(config: &SimConfig, state: &mut SimulationState, id: AgentId) -> Option<MovePlan> {
    let agent = state.population.get(id)?;
    let ctx = MovementContext {
        field: &state.field,
        social: &state.social,
        population: &state.population,
        params: &config.movement,
    };
    Some(agent.movement.behavior().plan(agent, &ctx, state.rng.as_mut()))
}

/// Plays one encounter if neither agent has interacted this tick.
fn interact(
    config: &SimConfig,
    state: &mut SimulationState,
    payoff: &PayoffEngine,
    a: AgentId,
    b: AgentId,
) {
    if a == b {
        return;
    }
    let (Some(first), Some(second)) = (state.population.get(a), state.population.get(b)) else {
        return;
    };
    if first.has_interacted() || second.has_interacted() {
        return;
    }
    let (handle_a, traits_a) = (first.handle(), first.traits);
    let (handle_b, traits_b) = (second.handle(), second.traits);

    if config.social.enabled {
        state.social.record_interaction(a, b, &traits_a);
        state.social.record_interaction(b, a, &traits_b);
    }

    payoff.settle(a, b, &mut state.population, &state.social, &state.field);

    if let Some(agent) = state.population.get_mut(a) {
        agent.record_partner(handle_b);
    }
    if let Some(agent) = state.population.get_mut(b) {
        agent.record_partner(handle_a);
    }
}
