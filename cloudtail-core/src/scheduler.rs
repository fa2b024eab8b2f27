//! Per-group scheduling state and worker admission. The global worker budget
//! bounds total concurrency; the state map prevents per-group duplication
//! when polling cycles overlap (a slow group still finishing cycle N while
//! cycle N+1 starts).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Scheduling state of one log group. At most one non-idle entry may exist
/// for a group at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Not scheduled.
    Idle,
    /// A worker holds the group and is fetching pages for its window.
    Listing,
    /// The window is fully fetched and is being processed/checkpointed.
    Processing,
}

/// The single concurrent lookup of per-group states. Check-then-set runs
/// under one lock, so a group can never be admitted twice.
#[derive(Clone, Default)]
pub(crate) struct GroupTracker {
    states: Arc<parking_lot::Mutex<HashMap<String, GroupState>>>,
}

impl GroupTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self, group: &str) -> GroupState {
        self.states
            .lock()
            .get(group)
            .copied()
            .unwrap_or(GroupState::Idle)
    }

    /// `Idle -> Listing`. Returns false when the group is already in flight.
    fn begin_listing(&self, group: &str) -> bool {
        let mut states = self.states.lock();
        match states.get(group) {
            Some(GroupState::Listing) | Some(GroupState::Processing) => false,
            _ => {
                states.insert(group.to_string(), GroupState::Listing);
                true
            }
        }
    }

    /// `Listing -> Processing`, once the query has returned the full window.
    fn mark_processing(&self, group: &str) {
        self.states
            .lock()
            .insert(group.to_string(), GroupState::Processing);
    }

    fn reset(&self, group: &str) {
        self.states.lock().remove(group);
    }
}

/// Held by a worker for the duration of one polling task. Dropping the guard
/// returns the group to `Idle` and releases the gate permit on every exit
/// path, panics and cancellation included.
pub(crate) struct InflightGuard {
    tracker: GroupTracker,
    group: String,
    _permit: Option<OwnedSemaphorePermit>,
}

impl InflightGuard {
    pub(crate) fn mark_processing(&self) {
        self.tracker.mark_processing(&self.group);
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.tracker.reset(&self.group);
    }
}

/// Admits polling tasks: one per group, bounded overall by the worker budget.
pub(crate) struct GroupScheduler {
    tracker: GroupTracker,
    gate: Arc<Semaphore>,
}

impl GroupScheduler {
    pub(crate) fn new(worker_budget: usize) -> Self {
        GroupScheduler {
            tracker: GroupTracker::new(),
            gate: Arc::new(Semaphore::new(worker_budget)),
        }
    }

    #[cfg(test)]
    fn tracker(&self) -> &GroupTracker {
        &self.tracker
    }

    /// Admits `group` for one polling task: flips it to `Listing`, then waits
    /// for a gate permit. Returns `None` when the group is still in progress
    /// from a previous cycle (backpressure, not a fault), and
    /// [Error::Cancelled] when shutdown interrupts the wait.
    pub(crate) async fn admit(
        &self,
        group: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<InflightGuard>> {
        if !self.tracker.begin_listing(group) {
            debug!(group, "group still in progress, skipping this polling cycle");
            return Ok(None);
        }

        // the guard exists before the permit wait so the state is restored
        // even when the wait is cancelled or the future is dropped
        let mut guard = InflightGuard {
            tracker: self.tracker.clone(),
            group: group.to_string(),
            _permit: None,
        };

        let permit = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = Arc::clone(&self.gate).acquire_owned() => {
                permit.map_err(|e| Error::Other(format!("worker gate closed: {e}")))?
            }
        };
        guard._permit = Some(permit);
        Ok(Some(guard))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_group_is_never_admitted_twice() {
        let scheduler = GroupScheduler::new(4);
        let cancel = CancellationToken::new();

        let guard = scheduler.admit("/ecs/app-one", &cancel).await.unwrap();
        assert!(guard.is_some());
        assert_eq!(scheduler.tracker().state("/ecs/app-one"), GroupState::Listing);

        // second admission for the same group is skipped, other groups pass
        assert!(scheduler.admit("/ecs/app-one", &cancel).await.unwrap().is_none());
        assert!(scheduler.admit("/ecs/app-two", &cancel).await.unwrap().is_some());

        drop(guard);
        assert_eq!(scheduler.tracker().state("/ecs/app-one"), GroupState::Idle);
        assert!(scheduler.admit("/ecs/app-one", &cancel).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_admission_races_admit_exactly_one() {
        let scheduler = Arc::new(GroupScheduler::new(16));
        let cancel = CancellationToken::new();

        for _ in 0..50 {
            let mut handles = vec![];
            for _ in 0..8 {
                let scheduler = Arc::clone(&scheduler);
                let cancel = cancel.clone();
                handles.push(tokio::spawn(async move {
                    scheduler.admit("/ecs/contended", &cancel).await.unwrap()
                }));
            }
            let mut guards = vec![];
            for handle in handles {
                if let Some(guard) = handle.await.unwrap() {
                    guards.push(guard);
                }
            }
            assert_eq!(guards.len(), 1, "exactly one racer may win the group");
        }
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let scheduler = GroupScheduler::new(1);
        let cancel = CancellationToken::new();

        let guard = scheduler
            .admit("/ecs/app-one", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scheduler.tracker().state("/ecs/app-one"), GroupState::Listing);
        guard.mark_processing();
        assert_eq!(
            scheduler.tracker().state("/ecs/app-one"),
            GroupState::Processing
        );
        drop(guard);
        assert_eq!(scheduler.tracker().state("/ecs/app-one"), GroupState::Idle);
    }

    #[tokio::test]
    async fn test_budget_bounds_admission_across_groups() {
        let scheduler = GroupScheduler::new(1);
        let cancel = CancellationToken::new();

        let first = scheduler.admit("/ecs/app-one", &cancel).await.unwrap();
        assert!(first.is_some());

        // the budget is exhausted, a second group must wait at the gate
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            scheduler.admit("/ecs/app-two", &cancel),
        )
        .await;
        assert!(waited.is_err(), "budget of 1 serializes groups");
        // dropping the timed-out admit future restored the state
        assert_eq!(scheduler.tracker().state("/ecs/app-two"), GroupState::Idle);

        drop(first);
        let second = scheduler.admit("/ecs/app-two", &cancel).await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_gate_wait_and_resets_state() {
        let scheduler = Arc::new(GroupScheduler::new(1));
        let cancel = CancellationToken::new();

        let holder = scheduler.admit("/ecs/app-one", &cancel).await.unwrap();

        let waiting = {
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.admit("/ecs/app-two", &cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        let res = waiting.await.unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
        assert_eq!(scheduler.tracker().state("/ecs/app-two"), GroupState::Idle);
        drop(holder);
    }
}
