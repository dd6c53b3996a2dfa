//! Vector clock for tracking per-actor sync progress.
//!
//! Each family member/device owns one counter. Clocks are combined
//! coordinate-wise; no total ordering or happened-before detection is
//! attempted — concurrent edits are expected and handed to the conflict
//! resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-actor monotonic counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create a new empty vector clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter for an actor; absent actors read as 0.
    pub fn get(&self, actor_id: &str) -> u64 {
        self.counters.get(actor_id).copied().unwrap_or(0)
    }

    /// Increment the actor's counter by exactly one and return the new value.
    pub fn bump(&mut self, actor_id: &str) -> u64 {
        let counter = self.counters.entry(actor_id.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Coordinate-wise maximum over the union of actors. Never decreases
    /// any counter.
    pub fn merge(&self, other: &VectorClock) -> VectorClock {
        let mut merged = self.counters.clone();
        for (actor, &count) in &other.counters {
            let entry = merged.entry(actor.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        VectorClock { counters: merged }
    }

    /// Actors with a counter in this clock.
    pub fn actors(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
