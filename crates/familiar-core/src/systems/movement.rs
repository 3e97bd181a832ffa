//! Movement System
//!
//! Computes each agent's next heading, destination and interaction partner.
//! The grid rule votes per axis; the continuous rule blends repulsion,
//! aggregation, flocking and persistence, then limits the turn.
//!
//! Planning is read-only. The stepper applies the plan afterwards.

use std::f64::consts::{PI, TAU};

use crate::components::{
    Agent, AgentId, MovementKind, Neighbor, Population, SocialGraph, SpatialField, SpaceMode, Vec2,
};
use crate::config::MovementConfig;
use crate::rng::RandomStream;

/// The eight grid steps a random move chooses from
pub const COMPASS: [(f64, f64); 8] = [
    (1.0, 1.0),
    (1.0, 0.0),
    (0.0, 1.0),
    (-1.0, -1.0),
    (-1.0, 0.0),
    (0.0, -1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
];

/// Read-only world state a movement rule may consult
pub struct MovementContext<'a> {
    pub field: &'a SpatialField,
    pub social: &'a SocialGraph,
    pub population: &'a Population,
    pub params: &'a MovementConfig,
}

impl MovementContext<'_> {
    /// Weight of a neighbor in `agent`'s movement: its bias if familiar,
    /// the complement otherwise.
    fn bias_toward(&self, agent: &Agent, other: AgentId) -> f64 {
        let bias = agent.traits.familiarity_bias;
        if self.social.is_familiar(agent.id, other) {
            bias
        } else {
            1.0 - bias
        }
    }

    fn heading_of(&self, id: AgentId) -> Vec2 {
        self.population.get(id).map(|a| a.heading).unwrap_or(Vec2::ZERO)
    }
}

/// Outcome of one planning step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    pub heading: Vec2,
    /// Wrapped position the agent ends up on
    pub destination: Vec2,
    pub partner: Option<AgentId>,
}

/// A movement rule
pub trait SpatialBehavior {
    /// Initial heading for a newborn.
    fn initial_heading(&self, rng: &mut dyn RandomStream) -> Vec2;

    fn plan(&self, agent: &Agent, ctx: &MovementContext<'_>, rng: &mut dyn RandomStream)
        -> MovePlan;
}

impl MovementKind {
    pub fn for_space(mode: SpaceMode) -> Self {
        match mode {
            SpaceMode::Grid => MovementKind::Discrete,
            SpaceMode::Continuous => MovementKind::Continuous,
        }
    }

    pub fn behavior(self) -> &'static dyn SpatialBehavior {
        match self {
            MovementKind::Discrete => &DiscreteMovement,
            MovementKind::Continuous => &ContinuousMovement,
        }
    }
}

/// Grid movement by per-axis majority vote
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscreteMovement;

/// Continuous movement with a bounded turn rate
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousMovement;

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn random_compass(rng: &mut dyn RandomStream) -> Vec2 {
    let (x, y) = COMPASS[rng.index(COMPASS.len())];
    Vec2::new(x, y)
}

/// First strictly nearest neighbor.
fn nearest(neighbors: &[Neighbor]) -> Option<AgentId> {
    let mut best: Option<&Neighbor> = None;
    for n in neighbors {
        if best.map_or(true, |b| n.distance < b.distance) {
            best = Some(n);
        }
    }
    best.map(|n| n.id)
}

/// Chooses the interaction partner: the nearest scanned neighbor, or a
/// uniformly random other agent within the interaction range.
fn choose_partner(
    agent: &Agent,
    scanned: &[Neighbor],
    ctx: &MovementContext<'_>,
    rng: &mut dyn RandomStream,
) -> Option<AgentId> {
    if ctx.params.random_interaction {
        let candidates =
            ctx.field
                .neighbors_within(agent.position, ctx.params.interact_range, Some(agent.id));
        if candidates.is_empty() {
            None
        } else {
            Some(candidates[rng.index(candidates.len())].id)
        }
    } else {
        nearest(scanned)
    }
}

impl SpatialBehavior for DiscreteMovement {
    fn initial_heading(&self, rng: &mut dyn RandomStream) -> Vec2 {
        let x = rng.index(3) as f64 - 1.0;
        let y = rng.index(3) as f64 - 1.0;
        Vec2::new(x, y)
    }

    fn plan(
        &self,
        agent: &Agent,
        ctx: &MovementContext<'_>,
        rng: &mut dyn RandomStream,
    ) -> MovePlan {
        let params = ctx.params;
        let mut partner = None;

        let mut heading = if rng.bernoulli(params.error_rate) {
            random_compass(rng)
        } else {
            let neighbors =
                ctx.field
                    .neighbors_within(agent.position, agent.view_range, Some(agent.id));
            let approach = 1.0 - params.flock_weight - params.persist_weight;
            let mut vote = Vec2::ZERO;
            for n in &neighbors {
                let bias = ctx.bias_toward(agent, n.id);
                let theirs = ctx.heading_of(n.id);
                vote.x += sign(theirs.x) * bias * params.flock_weight
                    + sign(n.offset.x) * bias * approach;
                vote.y += sign(theirs.y) * bias * params.flock_weight
                    + sign(n.offset.y) * bias * approach;
            }
            vote.x += sign(agent.heading.x) * params.persist_weight;
            vote.y += sign(agent.heading.y) * params.persist_weight;

            let mut heading = Vec2::new(sign(vote.x), sign(vote.y));
            if heading.is_zero() && params.always_move {
                heading = random_compass(rng);
            }
            partner = choose_partner(agent, &neighbors, ctx, rng);
            heading
        };

        // Standing still targets the agent's own cell, which counts as blocked.
        let mut target = ctx.field.wrap(agent.position + heading);
        let mut blocked = heading.is_zero() || ctx.field.is_occupied(target, agent.id);
        if blocked && params.bounce_on_collision {
            heading = random_compass(rng);
            target = ctx.field.wrap(agent.position + heading);
            blocked = ctx.field.is_occupied(target, agent.id);
        }
        let destination = if blocked { agent.position } else { target };

        MovePlan {
            heading,
            destination,
            partner,
        }
    }
}

/// Turns `old` toward `desired` by at most `max_turn` radians along the
/// shorter arc. A zero desire keeps the old heading.
pub fn limit_turn(old: Vec2, desired: Vec2, max_turn: f64) -> Vec2 {
    if desired.is_zero() {
        return old;
    }
    let old_angle = old.angle();
    let new_angle = desired.angle();
    let diff = (new_angle - old_angle + PI).rem_euclid(TAU) - PI;
    if diff.abs() > max_turn {
        Vec2::from_angle(old_angle + max_turn * diff.signum())
    } else {
        Vec2::from_angle(new_angle)
    }
}

impl SpatialBehavior for ContinuousMovement {
    fn initial_heading(&self, rng: &mut dyn RandomStream) -> Vec2 {
        let degrees: f64 = rng.uniform() * 360.0;
        Vec2::from_angle(degrees.to_radians())
    }

    fn plan(
        &self,
        agent: &Agent,
        ctx: &MovementContext<'_>,
        rng: &mut dyn RandomStream,
    ) -> MovePlan {
        let params = ctx.params;
        let crowd =
            ctx.field
                .neighbors_within(agent.position, params.repulse_range, Some(agent.id));

        let (mut direction, scanned) = if !crowd.is_empty() {
            let mut away = Vec2::ZERO;
            for n in crowd.iter().filter(|n| n.distance > 0.0) {
                away = away - n.offset * (1.0 / n.distance);
            }
            (away.normalized(), crowd)
        } else {
            let visible =
                ctx.field
                    .neighbors_within(agent.position, agent.view_range, Some(agent.id));
            if visible.is_empty() {
                (agent.heading, visible)
            } else {
                let mut aggregate = Vec2::ZERO;
                let mut flock = Vec2::ZERO;
                for n in &visible {
                    let bias = ctx.bias_toward(agent, n.id);
                    if n.distance > 0.0 {
                        aggregate = aggregate + n.offset * (bias / n.distance);
                    }
                    flock = flock + ctx.heading_of(n.id) * bias;
                }
                let p = params.persist_weight;
                let f = params.flock_weight;
                let blended = aggregate.normalized() * ((1.0 - p) * (1.0 - f))
                    + flock.normalized() * ((1.0 - p) * f)
                    + agent.heading * p;
                (blended, visible)
            }
        };

        direction.x += rng.gaussian() * params.error_rate;
        direction.y += rng.gaussian() * params.error_rate;

        let partner = choose_partner(agent, &scanned, ctx, rng);

        let max_turn = params.step_size * params.max_rotation_degrees.to_radians();
        let heading = limit_turn(agent.heading, direction, max_turn);
        let destination = ctx.field.wrap(agent.position + heading * params.step_size);

        MovePlan {
            heading,
            destination,
            partner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentHandle, Traits};
    use crate::rng::SeededStream;

    fn agent(id: u32, position: Vec2, heading: Vec2, movement: MovementKind) -> Agent {
        Agent {
            id: AgentId(id),
            serial: id as u64,
            position,
            heading,
            traits: Traits::default(),
            view_range: 3.0,
            fitness: 0.0,
            age: 0,
            lifespan: 100,
            cooperator: false,
            movement,
            interactions_this_tick: 0,
            lifetime_interactions: 0,
            last_partner: None::<AgentHandle>,
            offspring: 0,
        }
    }

    struct World {
        field: SpatialField,
        social: SocialGraph,
        population: Population,
    }

    impl World {
        fn new(mode: SpaceMode, dims: u32) -> Self {
            Self {
                field: SpatialField::new(mode, dims),
                social: SocialGraph::new(),
                population: Population::new(100, false),
            }
        }

        fn add(&mut self, a: Agent) {
            self.field.place(a.id, a.position);
            self.population.insert(a);
        }

        fn ctx<'a>(&'a self, params: &'a MovementConfig) -> MovementContext<'a> {
            MovementContext {
                field: &self.field,
                social: &self.social,
                population: &self.population,
                params,
            }
        }
    }

    fn quiet() -> MovementConfig {
        MovementConfig {
            error_rate: 0.0,
            ..MovementConfig::default()
        }
    }

    #[test]
    fn test_limit_turn_takes_shorter_arc() {
        let old = Vec2::from_angle(170f64.to_radians());
        let desired = Vec2::from_angle((-170f64).to_radians());
        let turned = limit_turn(old, desired, 5f64.to_radians());
        let expected = 175f64.to_radians();
        assert!((turned.angle() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_limit_turn_zero_desire_keeps_heading() {
        let old = Vec2::new(0.0, 1.0);
        assert_eq!(limit_turn(old, Vec2::ZERO, 0.1), old);
    }

    #[test]
    fn test_lone_continuous_agent_keeps_heading() {
        let mut world = World::new(SpaceMode::Continuous, 50);
        let heading = Vec2::from_angle(0.3);
        let a = agent(0, Vec2::new(10.0, 10.0), heading, MovementKind::Continuous);
        world.add(a.clone());
        let params = quiet();
        let mut rng = SeededStream::new(1);

        let plan = ContinuousMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert!((plan.heading.angle() - 0.3).abs() < 1e-9);
        assert!((plan.destination.x - (10.0 + 0.3f64.cos())).abs() < 1e-9);
        assert_eq!(plan.partner, None);
    }

    #[test]
    fn test_repulsion_turns_away_and_picks_nearest() {
        let mut world = World::new(SpaceMode::Continuous, 50);
        let a = agent(0, Vec2::new(10.0, 10.0), Vec2::new(1.0, 0.0), MovementKind::Continuous);
        world.add(a.clone());
        world.add(agent(1, Vec2::new(10.5, 10.0), Vec2::new(1.0, 0.0), MovementKind::Continuous));
        world.add(agent(2, Vec2::new(12.0, 10.0), Vec2::new(1.0, 0.0), MovementKind::Continuous));
        let params = MovementConfig {
            max_rotation_degrees: 180.0,
            ..quiet()
        };
        let mut rng = SeededStream::new(1);

        let plan = ContinuousMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert!(plan.heading.x < -0.99);
        assert_eq!(plan.partner, Some(AgentId(1)));
    }

    #[test]
    fn test_discrete_moves_toward_neighbor() {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::ZERO, MovementKind::Discrete);
        world.add(a.clone());
        world.add(agent(1, Vec2::new(7.0, 5.0), Vec2::ZERO, MovementKind::Discrete));
        let params = MovementConfig {
            flock_weight: 0.0,
            persist_weight: 0.0,
            ..quiet()
        };
        let mut rng = SeededStream::new(1);

        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert_eq!(plan.heading, Vec2::new(1.0, 0.0));
        assert_eq!(plan.destination, Vec2::new(6.0, 5.0));
        assert_eq!(plan.partner, Some(AgentId(1)));
    }

    #[test]
    fn test_discrete_blocked_without_bounce_stays() {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::ZERO, MovementKind::Discrete);
        world.add(a.clone());
        world.add(agent(1, Vec2::new(6.0, 5.0), Vec2::ZERO, MovementKind::Discrete));
        let params = MovementConfig {
            flock_weight: 0.0,
            persist_weight: 0.0,
            ..quiet()
        };
        let mut rng = SeededStream::new(1);

        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert_eq!(plan.heading, Vec2::new(1.0, 0.0));
        assert_eq!(plan.destination, a.position);
    }

    fn surrounded(free: Option<(f64, f64)>) -> (World, Agent) {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::new(1.0, 0.0), MovementKind::Discrete);
        world.add(a.clone());
        let mut next = 1;
        for &(dx, dy) in COMPASS.iter().filter(|&&step| Some(step) != free) {
            let position = Vec2::new(5.0 + dx, 5.0 + dy);
            world.add(agent(next, position, Vec2::ZERO, MovementKind::Discrete));
            next += 1;
        }
        (world, a)
    }

    #[test]
    fn test_bounce_fully_surrounded_stays() {
        let (world, a) = surrounded(None);
        let params = MovementConfig {
            bounce_on_collision: true,
            ..quiet()
        };

        for seed in 0..50 {
            let mut rng = SeededStream::new(seed);
            let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);
            assert_eq!(plan.destination, a.position);
        }
    }

    #[test]
    fn test_bounce_can_reach_free_cell() {
        let free = (-1.0, 1.0);
        let (world, a) = surrounded(Some(free));
        let params = MovementConfig {
            bounce_on_collision: true,
            ..quiet()
        };
        let target = Vec2::new(5.0 + free.0, 5.0 + free.1);

        let mut moved = 0;
        for seed in 0..200 {
            let mut rng = SeededStream::new(seed);
            let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);
            if plan.destination != a.position {
                assert_eq!(plan.destination, target);
                assert_eq!(plan.heading, Vec2::new(free.0, free.1));
                moved += 1;
            }
        }
        assert!(moved > 0);
        assert!(moved < 200);
    }

    #[test]
    fn test_bounce_moves_a_still_agent() {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::ZERO, MovementKind::Discrete);
        world.add(a.clone());
        let params = MovementConfig {
            bounce_on_collision: true,
            ..quiet()
        };
        let mut rng = SeededStream::new(3);

        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert!(COMPASS.contains(&(plan.heading.x, plan.heading.y)));
        assert_eq!(plan.destination, world.field.wrap(a.position + plan.heading));
    }

    #[test]
    fn test_discrete_error_move_has_no_partner() {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::ZERO, MovementKind::Discrete);
        world.add(a.clone());
        world.add(agent(1, Vec2::new(8.0, 8.0), Vec2::ZERO, MovementKind::Discrete));
        let params = MovementConfig {
            error_rate: 1.0,
            ..MovementConfig::default()
        };
        let mut rng = SeededStream::new(4);

        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);

        assert_eq!(plan.partner, None);
        assert!(!plan.heading.is_zero());
        assert!(COMPASS.contains(&(plan.heading.x, plan.heading.y)));
    }

    #[test]
    fn test_still_agent_without_always_move() {
        let mut world = World::new(SpaceMode::Grid, 20);
        let a = agent(0, Vec2::new(5.0, 5.0), Vec2::ZERO, MovementKind::Discrete);
        world.add(a.clone());
        let params = quiet();
        let mut rng = SeededStream::new(2);

        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);
        assert!(plan.heading.is_zero());
        assert_eq!(plan.destination, a.position);

        let params = MovementConfig {
            always_move: true,
            ..quiet()
        };
        let plan = DiscreteMovement.plan(&a, &world.ctx(&params), &mut rng);
        assert!(!plan.heading.is_zero());
    }

    #[test]
    fn test_random_partner_within_interact_range() {
        let mut world = World::new(SpaceMode::Continuous, 50);
        let a = agent(0, Vec2::new(10.0, 10.0), Vec2::new(1.0, 0.0), MovementKind::Continuous);
        world.add(a.clone());
        world.add(agent(1, Vec2::new(11.0, 10.0), Vec2::ZERO, MovementKind::Continuous));
        world.add(agent(2, Vec2::new(10.0, 11.5), Vec2::ZERO, MovementKind::Continuous));
        world.add(agent(3, Vec2::new(20.0, 20.0), Vec2::ZERO, MovementKind::Continuous));
        let params = MovementConfig {
            random_interaction: true,
            repulse_range: 0.0,
            interact_range: 2.0,
            ..quiet()
        };
        let mut rng = SeededStream::new(8);

        for _ in 0..20 {
            let plan = ContinuousMovement.plan(&a, &world.ctx(&params), &mut rng);
            let partner = plan.partner.unwrap();
            assert!(partner == AgentId(1) || partner == AgentId(2));
        }
    }
}
