//! Lifecycle Events
//!
//! Births, deaths and generation replacements emitted by the population
//! manager. Serialized one per line (JSONL).

use serde::{Deserialize, Serialize};

/// Primary event type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    Death,
    Generation,
}

impl EventType {
    /// Returns all event type variants.
    pub fn all() -> &'static [EventType] {
        &[EventType::Birth, EventType::Death, EventType::Generation]
    }
}

/// Why an agent left the population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Age exceeded the drawn lifespan
    OldAge,
    /// Fitness fell below zero under strong selection
    Starvation,
    /// Removed by a synchronous generation replacement
    Replaced,
}

/// A single population lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Born {
        tick: u64,
        agent_id: u32,
        /// `None` for the founding population
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<u32>,
        cooperator: bool,
    },
    Died {
        tick: u64,
        agent_id: u32,
        cause: DeathCause,
        age: u32,
        offspring: u32,
        interactions: u64,
    },
    GenerationReplaced {
        tick: u64,
        generation: u64,
        population: usize,
    },
}

impl LifecycleEvent {
    /// Tick on which the event happened.
    pub fn tick(&self) -> u64 {
        match self {
            LifecycleEvent::Born { tick, .. }
            | LifecycleEvent::Died { tick, .. }
            | LifecycleEvent::GenerationReplaced { tick, .. } => *tick,
        }
    }

    /// Category of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            LifecycleEvent::Born { .. } => EventType::Birth,
            LifecycleEvent::Died { .. } => EventType::Death,
            LifecycleEvent::GenerationReplaced { .. } => EventType::Generation,
        }
    }

    /// Serializes the event to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
