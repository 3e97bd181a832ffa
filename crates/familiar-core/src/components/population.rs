//! Population Registry
//!
//! Live agents keyed by id, id allocation, and per-phenotype running totals.

use familiar_events::PhenotypeTotals;
use std::collections::{BTreeMap, VecDeque};

use super::agent::{Agent, AgentHandle, AgentId};

/// Running totals split by cooperation phenotype
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyTotals {
    pub defectors: PhenotypeTotals,
    pub cooperators: PhenotypeTotals,
}

impl StrategyTotals {
    fn side_mut(&mut self, cooperator: bool) -> &mut PhenotypeTotals {
        if cooperator {
            &mut self.cooperators
        } else {
            &mut self.defectors
        }
    }

    pub fn side(&self, cooperator: bool) -> &PhenotypeTotals {
        if cooperator {
            &self.cooperators
        } else {
            &self.defectors
        }
    }

    fn add_live(&mut self, agent: &Agent) {
        let side = self.side_mut(agent.cooperator);
        side.live += 1;
        side.familiarity_bias_sum += agent.traits.familiarity_bias;
        side.memory_capacity_sum += agent.traits.memory_capacity;
        side.learning_threshold_sum += agent.traits.learning_threshold;
        side.decay_rate_sum += agent.traits.decay_rate;
        side.view_range_sum += agent.view_range;
    }

    fn fold_dead(&mut self, agent: &Agent) {
        let side = self.side_mut(agent.cooperator);
        side.live -= 1;
        side.familiarity_bias_sum -= agent.traits.familiarity_bias;
        side.memory_capacity_sum -= agent.traits.memory_capacity;
        side.learning_threshold_sum -= agent.traits.learning_threshold;
        side.decay_rate_sum -= agent.traits.decay_rate;
        side.view_range_sum -= agent.view_range;
        side.dead += 1;
        side.lifetime_interactions += agent.lifetime_interactions;
        side.lifetime_offspring += agent.offspring as u64;
        side.lifetime_age += agent.age as u64;
    }
}

/// Registry of live agents
#[derive(Debug, Clone)]
pub struct Population {
    agents: BTreeMap<AgentId, Agent>,
    capacity: usize,
    /// Released ids, oldest first. Only filled when ids are recycled.
    free_ids: VecDeque<AgentId>,
    recycle_ids: bool,
    next_id: u32,
    next_serial: u64,
    totals: StrategyTotals,
}

impl Population {
    /// Creates an empty registry. With `recycle_ids` a freed id is handed
    /// out again before any fresh one.
    pub fn new(capacity: usize, recycle_ids: bool) -> Self {
        Self {
            agents: BTreeMap::new(),
            capacity,
            free_ids: VecDeque::new(),
            recycle_ids,
            next_id: 0,
            next_serial: 0,
            totals: StrategyTotals::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.capacity
    }

    /// Next id and birth serial for a newborn.
    pub fn allocate(&mut self) -> (AgentId, u64) {
        let id = match self.free_ids.pop_front() {
            Some(id) => id,
            None => {
                let id = AgentId(self.next_id);
                self.next_id += 1;
                id
            }
        };
        let serial = self.next_serial;
        self.next_serial += 1;
        (id, serial)
    }

    pub fn insert(&mut self, agent: Agent) {
        self.totals.add_live(&agent);
        self.agents.insert(agent.id, agent);
    }

    /// Removes an agent, folds its lifetime stats into the totals and
    /// releases its id.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        self.totals.fold_dead(&agent);
        if self.recycle_ids {
            self.free_ids.push_back(id);
        }
        Some(agent)
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Resolves a handle; `None` once that individual has died.
    pub fn resolve(&self, handle: AgentHandle) -> Option<&Agent> {
        self.agents.get(&handle.id).filter(|a| a.serial == handle.serial)
    }

    pub fn resolve_mut(&mut self, handle: AgentHandle) -> Option<&mut Agent> {
        self.agents
            .get_mut(&handle.id)
            .filter(|a| a.serial == handle.serial)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Handles of every live agent in ascending id order.
    pub fn handles(&self) -> Vec<AgentHandle> {
        self.agents.values().map(Agent::handle).collect()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    pub fn cooperators(&self) -> usize {
        self.totals.cooperators.live
    }

    pub fn totals(&self) -> &StrategyTotals {
        &self.totals
    }
}
