//! Checkpoints make polling resumable without redelivering events. A
//! checkpoint records the last processed event timestamp for a group plus the
//! identifiers observed at exactly that timestamp; the next window starts at
//! the checkpoint position, so events sharing the boundary timestamp can
//! reappear and are filtered out by identifier.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::event::RawLogEvent;

/// Persisted progress marker for one log group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Max processed event timestamp, epoch milliseconds.
    pub timestamp: i64,
    /// Identifiers observed at exactly `timestamp`. Bounded by construction:
    /// only the boundary timestamp's ids are kept.
    pub boundary_ids: Vec<String>,
}

impl Checkpoint {
    pub fn new(timestamp: i64) -> Self {
        Checkpoint {
            timestamp,
            boundary_ids: vec![],
        }
    }

    /// Drops events already observed: anything older than the checkpoint, and
    /// boundary-timestamp events whose identifier is in the duplicate set.
    pub fn filter_new(&self, events: Vec<RawLogEvent>) -> Vec<RawLogEvent> {
        events
            .into_iter()
            .filter(|event| {
                if event.timestamp < self.timestamp {
                    return false;
                }
                event.timestamp > self.timestamp
                    || !self.boundary_ids.iter().any(|id| id == &event.event_id)
            })
            .collect()
    }

    /// The checkpoint after `delivered` has been handed downstream. Advances
    /// to the batch's max timestamp and keeps only the identifiers seen at
    /// that timestamp; when the batch stays on the current boundary, the
    /// existing duplicate set grows instead of being replaced.
    pub fn advanced(&self, delivered: &[RawLogEvent]) -> Checkpoint {
        let Some(max_ts) = delivered.iter().map(|event| event.timestamp).max() else {
            return self.clone();
        };
        if max_ts < self.timestamp {
            return self.clone();
        }

        let mut boundary_ids: Vec<String> = if max_ts == self.timestamp {
            self.boundary_ids.clone()
        } else {
            vec![]
        };
        for event in delivered {
            if event.timestamp == max_ts && !boundary_ids.contains(&event.event_id) {
                boundary_ids.push(event.event_id.clone());
            }
        }
        Checkpoint {
            timestamp: max_ts,
            boundary_ids,
        }
    }
}

/// Key/value persistence contract backing checkpoints. Keys are opaque
/// strings scoped per log group; per-key get/put must be atomic, no
/// cross-key transactions are required. The poller never deletes entries.
#[trait_variant::make(Send)]
pub trait CheckpointStore {
    async fn get(&self, group: &str) -> Result<Option<Checkpoint>>;
    async fn put(&self, group: &str, checkpoint: Checkpoint) -> Result<()>;
}

/// Process-local store for embedding and tests.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    entries: Arc<parking_lot::RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, group: &str) -> Result<Option<Checkpoint>> {
        Ok(self.entries.read().get(group).cloned())
    }

    async fn put(&self, group: &str, checkpoint: Checkpoint) -> Result<()> {
        self.entries.write().insert(group.to_string(), checkpoint);
        Ok(())
    }
}
