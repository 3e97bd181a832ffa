//! Social Graph
//!
//! Two weighted directed graphs over live agents. The interaction graph
//! counts recent encounters; the familiarity graph is the bounded subset an
//! agent actually remembers.
//!
//! Every familiarity edge shadows an interaction edge of equal weight. Each
//! source keeps at most `memory_capacity` familiarity edges, and the graph
//! caches the weakest one per source so a stronger candidate can evict it in
//! constant time.

use std::collections::{BTreeMap, BTreeSet};

use super::agent::{AgentId, Traits};

/// Directed graph with real weights and an incoming index
#[derive(Debug, Clone, Default)]
pub struct WeightedDigraph {
    outgoing: BTreeMap<AgentId, BTreeMap<AgentId, f64>>,
    incoming: BTreeMap<AgentId, BTreeSet<AgentId>>,
}

impl WeightedDigraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, from: AgentId, to: AgentId) -> Option<f64> {
        self.outgoing.get(&from).and_then(|edges| edges.get(&to)).copied()
    }

    pub fn contains(&self, from: AgentId, to: AgentId) -> bool {
        self.weight(from, to).is_some()
    }

    /// Sets an edge weight, creating the edge if needed. Returns the old weight.
    pub fn set(&mut self, from: AgentId, to: AgentId, weight: f64) -> Option<f64> {
        self.incoming.entry(to).or_default().insert(from);
        self.outgoing.entry(from).or_default().insert(to, weight)
    }

    /// Updates an existing edge only. Returns the old weight if it existed.
    fn set_if_present(&mut self, from: AgentId, to: AgentId, weight: f64) -> Option<f64> {
        let slot = self.outgoing.get_mut(&from)?.get_mut(&to)?;
        Some(std::mem::replace(slot, weight))
    }

    pub fn remove_edge(&mut self, from: AgentId, to: AgentId) -> Option<f64> {
        let edges = self.outgoing.get_mut(&from)?;
        let weight = edges.remove(&to)?;
        if edges.is_empty() {
            self.outgoing.remove(&from);
        }
        if let Some(sources) = self.incoming.get_mut(&to) {
            sources.remove(&from);
            if sources.is_empty() {
                self.incoming.remove(&to);
            }
        }
        Some(weight)
    }

    /// Outgoing edges of `from` in ascending target order.
    pub fn out_edges(&self, from: AgentId) -> impl Iterator<Item = (AgentId, f64)> + '_ {
        self.outgoing
            .get(&from)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(&to, &w)| (to, w)))
    }

    pub fn out_degree(&self, from: AgentId) -> usize {
        self.outgoing.get(&from).map(|edges| edges.len()).unwrap_or(0)
    }

    /// Sources with an edge into `to`, ascending.
    pub fn sources_of(&self, to: AgentId) -> Vec<AgentId> {
        self.incoming
            .get(&to)
            .map(|sources| sources.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every edge as `(from, to, weight)`, ordered by source then target.
    pub fn edges(&self) -> impl Iterator<Item = (AgentId, AgentId, f64)> + '_ {
        self.outgoing
            .iter()
            .flat_map(|(&from, edges)| edges.iter().map(move |(&to, &w)| (from, to, w)))
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(|edges| edges.len()).sum()
    }

    /// Removes a node and returns its former out-edges and in-edges.
    pub fn remove_node(&mut self, id: AgentId) -> (Vec<(AgentId, f64)>, Vec<(AgentId, f64)>) {
        let out: Vec<(AgentId, f64)> = self.out_edges(id).collect();
        for &(to, _) in &out {
            self.remove_edge(id, to);
        }
        let mut inc = Vec::new();
        for from in self.sources_of(id) {
            if let Some(w) = self.remove_edge(from, id) {
                inc.push((from, w));
            }
        }
        (out, inc)
    }
}

/// Interaction and familiarity graphs with incremental totals
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    interaction: WeightedDigraph,
    familiarity: WeightedDigraph,
    /// Weakest familiarity target per source
    weakest: BTreeMap<AgentId, AgentId>,
    familiarity_edges: usize,
    familiarity_weight: f64,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interaction(&self) -> &WeightedDigraph {
        &self.interaction
    }

    pub fn familiarity(&self) -> &WeightedDigraph {
        &self.familiarity
    }

    pub fn interaction_weight(&self, from: AgentId, to: AgentId) -> Option<f64> {
        self.interaction.weight(from, to)
    }

    pub fn familiarity_weight(&self, from: AgentId, to: AgentId) -> Option<f64> {
        self.familiarity.weight(from, to)
    }

    pub fn is_familiar(&self, from: AgentId, to: AgentId) -> bool {
        self.familiarity.contains(from, to)
    }

    pub fn familiar_count(&self, id: AgentId) -> usize {
        self.familiarity.out_degree(id)
    }

    /// Tracked number of familiarity edges
    pub fn familiarity_edge_count(&self) -> usize {
        self.familiarity_edges
    }

    /// Tracked sum of familiarity weights
    pub fn total_familiarity_weight(&self) -> f64 {
        self.familiarity_weight
    }

    /// Cached weakest familiarity target of `id`, if it has any.
    pub fn weakest_link(&self, id: AgentId) -> Option<AgentId> {
        self.weakest.get(&id).copied()
    }

    /// Records one encounter `from -> to` and runs the familiarity promotion
    /// for `from`, whose traits decide threshold and capacity.
    pub fn record_interaction(&mut self, from: AgentId, to: AgentId, traits: &Traits) {
        let weight = self.interaction.weight(from, to).unwrap_or(0.0) + 1.0;
        self.interaction.set(from, to, weight);

        if let Some(old) = self.familiarity.set_if_present(from, to, weight) {
            self.familiarity_weight += weight - old;
            if self.weakest.get(&from) == Some(&to) {
                self.refresh_weakest(from);
            }
            return;
        }

        if weight <= traits.learning_threshold {
            return;
        }

        let degree = self.familiarity.out_degree(from);
        if (degree + 1) as f64 <= traits.memory_capacity {
            self.admit(from, to, weight);
            let replace = match self.weakest_weight(from) {
                None => true,
                Some((current, w)) => weight < w || (weight == w && to < current),
            };
            if replace {
                self.weakest.insert(from, to);
            }
        } else if let Some((victim, victim_weight)) = self.weakest_weight(from) {
            if weight > victim_weight {
                self.drop_familiar(from, victim);
                self.admit(from, to, weight);
                self.refresh_weakest(from);
            }
        }
    }

    /// Applies one tick of decay to every outgoing interaction edge of `from`
    /// and re-syncs its familiarity edges.
    pub fn decay(&mut self, from: AgentId, decay_rate: f64) {
        let edges: Vec<(AgentId, f64)> = self.interaction.out_edges(from).collect();
        for (to, weight) in edges {
            let decayed = weight - decay_rate;
            if decayed <= 0.0 {
                self.interaction.remove_edge(from, to);
                self.drop_familiar(from, to);
            } else {
                self.interaction.set(from, to, decayed);
                if let Some(old) = self.familiarity.set_if_present(from, to, decayed) {
                    self.familiarity_weight += decayed - old;
                }
            }
        }
        self.refresh_weakest(from);
    }

    /// Removes every edge touching `id` from both graphs.
    pub fn remove_agent(&mut self, id: AgentId) {
        let (out, inc) = self.familiarity.remove_node(id);
        for (_, w) in out.iter().chain(inc.iter()) {
            self.familiarity_edges -= 1;
            self.familiarity_weight -= w;
        }
        self.weakest.remove(&id);
        for (source, _) in inc {
            if self.weakest.get(&source) == Some(&id) {
                self.refresh_weakest(source);
            }
        }
        self.interaction.remove_node(id);
    }

    /// Full recount of familiarity edges and weight.
    pub fn recount(&self) -> (usize, f64) {
        self.familiarity
            .edges()
            .fold((0, 0.0), |(n, w), (_, _, weight)| (n + 1, w + weight))
    }

    /// Local clustering coefficient of `id` on the familiarity graph: the
    /// fraction of ordered pairs of its familiars that are themselves
    /// familiar.
    pub fn local_clustering(&self, id: AgentId) -> f64 {
        let familiars: Vec<AgentId> = self.familiarity.out_edges(id).map(|(to, _)| to).collect();
        let k = familiars.len();
        if k < 2 {
            return 0.0;
        }
        let mut linked = 0usize;
        for &j in &familiars {
            for &l in &familiars {
                if j != l && self.familiarity.contains(j, l) {
                    linked += 1;
                }
            }
        }
        linked as f64 / (k * (k - 1)) as f64
    }

    /// Sum of local clustering over `ids` divided by their number.
    pub fn mean_clustering(&self, ids: &[AgentId]) -> f64 {
        if ids.is_empty() {
            return 0.0;
        }
        let total: f64 = ids.iter().map(|&id| self.local_clustering(id)).sum();
        total / ids.len() as f64
    }

    fn admit(&mut self, from: AgentId, to: AgentId, weight: f64) {
        self.familiarity.set(from, to, weight);
        self.familiarity_edges += 1;
        self.familiarity_weight += weight;
    }

    fn drop_familiar(&mut self, from: AgentId, to: AgentId) {
        if let Some(w) = self.familiarity.remove_edge(from, to) {
            self.familiarity_edges -= 1;
            self.familiarity_weight -= w;
            if self.weakest.get(&from) == Some(&to) {
                self.refresh_weakest(from);
            }
        }
    }

    fn weakest_weight(&self, from: AgentId) -> Option<(AgentId, f64)> {
        let target = self.weakest.get(&from).copied()?;
        let weight = self.familiarity.weight(from, target)?;
        Some((target, weight))
    }

    /// Recomputes the weakest link of `from`; lowest target id wins ties.
    fn refresh_weakest(&mut self, from: AgentId) {
        let mut best: Option<(AgentId, f64)> = None;
        for (to, w) in self.familiarity.out_edges(from) {
            match best {
                Some((_, bw)) if w >= bw => {}
                _ => best = Some((to, w)),
            }
        }
        match best {
            Some((to, _)) => {
                self.weakest.insert(from, to);
            }
            None => {
                self.weakest.remove(&from);
            }
        }
    }
}
