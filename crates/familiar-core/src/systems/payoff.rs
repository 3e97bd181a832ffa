//! Payoff System
//!
//! Fitness consequences of an interaction. Exactly one game is played per
//! run; the public goods game pulls in every unmarked agent reachable through
//! the interaction range.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::components::{AgentId, Population, SocialGraph, SpatialField};
use crate::config::PayoffConfig;

/// Game played when two agents meet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Donation game: cooperators pay `cost` to grant `benefit`
    #[default]
    PairwiseCooperation,
    /// Fitness equals accumulated familiarity
    FamiliarityPayoff,
    /// Every interaction is worth one unit
    InteractionCount,
    /// Group game over the spatially connected cluster
    PublicGoods,
}

/// Applies the configured game to agents in the population
#[derive(Debug, Clone)]
pub struct PayoffEngine {
    params: PayoffConfig,
    /// Charge `aggregation_cost * view_range^2` in the pairwise game
    charge_aggregation: bool,
    interact_range: f64,
}

impl PayoffEngine {
    pub fn new(params: PayoffConfig, charge_aggregation: bool, interact_range: f64) -> Self {
        Self {
            params,
            charge_aggregation,
            interact_range,
        }
    }

    pub fn game(&self) -> GameVariant {
        self.params.game
    }

    /// Settles the interaction initiated by `initiator` with `partner`.
    pub fn settle(
        &self,
        initiator: AgentId,
        partner: AgentId,
        population: &mut Population,
        social: &SocialGraph,
        field: &SpatialField,
    ) {
        match self.params.game {
            GameVariant::PairwiseCooperation => self.donation(initiator, partner, population),
            GameVariant::FamiliarityPayoff => {
                let gain_initiator = social.familiarity_weight(initiator, partner);
                let gain_partner = social.familiarity_weight(partner, initiator);
                if let (Some(gain), Some(a)) = (gain_initiator, population.get_mut(initiator)) {
                    a.fitness += gain;
                }
                if let (Some(gain), Some(b)) = (gain_partner, population.get_mut(partner)) {
                    b.fitness += gain;
                }
            }
            GameVariant::InteractionCount => {
                for id in [initiator, partner] {
                    if let Some(a) = population.get_mut(id) {
                        a.fitness += 1.0;
                    }
                }
            }
            GameVariant::PublicGoods => {
                self.public_goods(initiator, population, field);
            }
        }
    }

    fn donation(&self, a: AgentId, b: AgentId, population: &mut Population) {
        let (Some(coop_a), Some(coop_b)) = (
            population.get(a).map(|x| x.cooperator),
            population.get(b).map(|x| x.cooperator),
        ) else {
            return;
        };
        let p = &self.params;
        for (id, gives, receives) in [(a, coop_a, coop_b), (b, coop_b, coop_a)] {
            if let Some(agent) = population.get_mut(id) {
                if gives {
                    agent.fitness -= p.cost;
                }
                if receives {
                    agent.fitness += p.benefit;
                }
                if self.charge_aggregation {
                    agent.fitness -= p.aggregation_cost * agent.view_range.powi(2);
                }
            }
        }
    }

    /// Plays the public goods game for the group grown from `initiator` and
    /// returns the group members in visit order.
    pub fn public_goods(
        &self,
        initiator: AgentId,
        population: &mut Population,
        field: &SpatialField,
    ) -> Vec<AgentId> {
        let group = gather_group(initiator, population, field, self.interact_range);
        let size = group.len();
        let cooperators = group
            .iter()
            .filter(|&&id| population.get(id).map_or(false, |a| a.cooperator))
            .count();

        let p = &self.params;
        for &id in &group {
            if let Some(agent) = population.get_mut(id) {
                let mut others = cooperators as f64;
                if agent.cooperator {
                    agent.fitness -= p.cost;
                    others -= 1.0;
                }
                if size > 1 {
                    agent.fitness += p.benefit * others / (size - 1) as f64;
                }
                agent.fitness -= p.aggregation_cost * agent.view_range.powi(2);
            }
        }
        group
    }
}

/// Breadth-first flood fill through the interaction range.
///
/// Starts at `start` and visits every agent that has not interacted this
/// tick, marking each one as it is enqueued, so no agent joins two groups in
/// the same tick.
pub fn gather_group(
    start: AgentId,
    population: &mut Population,
    field: &SpatialField,
    radius: f64,
) -> Vec<AgentId> {
    let mut group = Vec::new();
    let mut queue = VecDeque::new();
    match population.get_mut(start) {
        Some(agent) => agent.join_group(),
        None => return group,
    }
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        group.push(current);
        let Some(center) = field.position(current) else {
            continue;
        };
        for n in field.neighbors_within(center, radius, Some(current)) {
            if let Some(agent) = population.get_mut(n.id) {
                if agent.interactions_this_tick == 0 {
                    agent.join_group();
                    queue.push_back(n.id);
                }
            }
        }
    }
    group
}
