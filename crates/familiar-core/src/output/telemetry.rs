//! Telemetry
//!
//! Read-only views built from the simulation state: aggregate snapshots for
//! analysis and per-agent views for rendering.

use familiar_events::{
    generate_snapshot_id, AgentView, FamiliarityEdgeView, PopulationSnapshot, WorldView,
};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::components::SpaceMode;
use crate::error::SimResult;
use crate::simulation::SimulationState;

/// Decides on which ticks the driver records a snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSchedule {
    interval: u64,
}

impl SnapshotSchedule {
    /// An interval of 0 records only the initial state.
    pub fn new(interval: u64) -> Self {
        Self { interval }
    }

    pub fn should_snapshot(&self, tick: u64) -> bool {
        tick == 0 || (self.interval > 0 && tick % self.interval == 0)
    }
}

/// Builds the aggregate snapshot for the current tick.
pub fn population_snapshot(
    state: &SimulationState,
    run_id: Uuid,
    sequence: u64,
    with_clustering: bool,
) -> PopulationSnapshot {
    let totals = state.population.totals();
    let clustering =
        with_clustering.then(|| state.social.mean_clustering(&state.population.ids()));

    PopulationSnapshot {
        snapshot_id: generate_snapshot_id(sequence),
        run_id,
        tick: state.tick,
        population: state.population.len(),
        cooperators: state.population.cooperators(),
        familiarity_edges: state.social.familiarity_edge_count(),
        familiarity_weight: state.social.total_familiarity_weight(),
        clustering,
        defector_totals: totals.defectors.clone(),
        cooperator_totals: totals.cooperators.clone(),
    }
}

/// Builds the rendering view of the current tick.
pub fn world_view(state: &SimulationState, with_edges: bool) -> WorldView {
    let agents = state
        .population
        .iter()
        .map(|a| AgentView {
            agent_id: a.id.0,
            x: a.position.x,
            y: a.position.y,
            heading: a.heading.to_array(),
            cooperator: a.cooperator,
            familiarity_bias: a.traits.familiarity_bias,
            view_range: a.view_range,
            fitness: a.fitness,
            age: a.age,
        })
        .collect();

    let familiarity_edges = if with_edges {
        state
            .social
            .familiarity()
            .edges()
            .map(|(from, to, weight)| FamiliarityEdgeView {
                from: from.0,
                to: to.0,
                weight,
            })
            .collect()
    } else {
        Vec::new()
    };

    WorldView {
        tick: state.tick,
        dims: state.field.dims(),
        continuous: state.field.mode() == SpaceMode::Continuous,
        agents,
        familiarity_edges,
    }
}

/// Writes a snapshot as pretty JSON.
pub fn write_snapshot(snapshot: &PopulationSnapshot, path: impl AsRef<Path>) -> SimResult<()> {
    let json = snapshot.to_json()?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes a snapshot into `dir` as `snap_{tick:06}.json`.
pub fn write_snapshot_to_dir(snapshot: &PopulationSnapshot, dir: impl AsRef<Path>) -> SimResult<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("snap_{:06}.json", snapshot.tick));
    write_snapshot(snapshot, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::rng::SeededStream;
    use crate::systems::lifecycle::PopulationManager;

    fn seeded_state() -> SimulationState {
        let mut config = SimConfig::default();
        config.population.capacity = 8;
        config.population.initial_cooperator_fraction = 0.5;
        let mut state = SimulationState::new(&config, Box::new(SeededStream::new(2)));
        PopulationManager::new(&config).spawn_founders(&mut state);
        state
    }

    #[test]
    fn test_snapshot_schedule() {
        let schedule = SnapshotSchedule::new(10);
        assert!(schedule.should_snapshot(0));
        assert!(!schedule.should_snapshot(5));
        assert!(schedule.should_snapshot(20));
        assert!(!SnapshotSchedule::new(0).should_snapshot(20));
    }

    #[test]
    fn test_population_snapshot_counts() {
        let state = seeded_state();
        let snap = population_snapshot(&state, Uuid::nil(), 3, false);

        assert_eq!(snap.snapshot_id, "snap_000003");
        assert_eq!(snap.population, 8);
        assert_eq!(snap.cooperators, 4);
        assert_eq!(snap.cooperator_totals.live, 4);
        assert_eq!(snap.defector_totals.live, 4);
        assert!((snap.cooperator_totals.mean_familiarity_bias() - 0.5).abs() < 1e-12);
        assert!(snap.clustering.is_none());
    }

    #[test]
    fn test_world_view_lists_agents() {
        let state = seeded_state();
        let view = world_view(&state, false);

        assert_eq!(view.agents.len(), 8);
        assert!(view.continuous);
        assert!(view.agents.iter().all(|a| a.x >= 0.0 && a.x < view.dims as f64));
        assert!(view.familiarity_edges.is_empty());
    }

    #[test]
    fn test_write_snapshot_to_dir() {
        let state = seeded_state();
        let snap = population_snapshot(&state, Uuid::nil(), 1, true);
        let dir = tempfile::tempdir().unwrap();

        write_snapshot_to_dir(&snap, dir.path().join("snapshots")).unwrap();

        let written = fs::read_to_string(dir.path().join("snapshots/snap_000000.json")).unwrap();
        let parsed: PopulationSnapshot = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.population, 8);
        assert_eq!(parsed.clustering, Some(0.0));
    }
}
