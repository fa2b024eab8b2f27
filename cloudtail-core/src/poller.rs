//! The coordinator. Owns the polling configuration, computes per-group time
//! windows from checkpoints, fans polling tasks out through the group
//! scheduler and drains them on shutdown. Every per-group failure stays
//! contained in that group's task; the coordinator and the other groups keep
//! running.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{LogGroupTarget, PollerConfig};
use crate::event::{LogRecord, RawLogEvent};
use crate::metrics::{group_labels, poller_metrics};
use crate::pacing::PacingGate;
use crate::processor::EventProcessor;
use crate::query::QueryClient;
use crate::scheduler::{GroupScheduler, InflightGuard};
use crate::window::{TimeWindow, next_window};
use crate::{Error, Result};

type Positions = Arc<parking_lot::Mutex<HashMap<String, Checkpoint>>>;

/// Polls the configured log groups until cancelled (or until a configured
/// backfill end is reached), handing each discovered batch to the event
/// processor and advancing checkpoints only after the processor accepts it.
pub struct Poller<C, P, S> {
    config: PollerConfig,
    region: Arc<str>,
    client: Arc<C>,
    processor: Arc<P>,
    store: Arc<S>,
    scheduler: GroupScheduler,
    pacing: PacingGate,
    /// In-memory view of each group's checkpoint, loaded once at startup and
    /// updated by workers after every durable advance.
    positions: Positions,
}

impl<C, P, S> Poller<C, P, S>
where
    C: QueryClient + Send + Sync + 'static,
    P: EventProcessor + Send + Sync + 'static,
    S: CheckpointStore + Send + Sync + 'static,
{
    /// Validates the configuration and assembles the poller. Configuration
    /// errors are fatal here, before any worker is spawned.
    pub fn new(config: PollerConfig, client: C, processor: P, store: S) -> Result<Self> {
        config.validate()?;
        let region: Arc<str> = Arc::from(config.region.as_str());
        let scheduler = GroupScheduler::new(config.worker_count);
        let pacing = PacingGate::new(config.pacing_interval());
        Ok(Poller {
            config,
            region,
            client: Arc::new(client),
            processor: Arc::new(processor),
            store: Arc::new(store),
            scheduler,
            pacing,
            positions: Positions::default(),
        })
    }

    /// Runs polling cycles until `cancel` fires, then drains: in-flight tasks
    /// finish their current window (checkpoint write included) while blocked
    /// permit waits, pacing sleeps and query calls unblock with
    /// [Error::Cancelled], so shutdown is bounded in time.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.load_checkpoints().await?;
        info!(
            region = self.region.as_ref(),
            groups = self.config.targets.len(),
            workers = self.config.worker_count,
            "poller running"
        );

        let mut workers: JoinSet<(String, Result<()>)> = JoinSet::new();
        loop {
            while let Some(finished) = workers.try_join_next() {
                log_worker_exit(finished);
            }
            if cancel.is_cancelled() {
                break;
            }
            match self.run_cycle(&cancel, &mut workers).await {
                Ok(()) => {}
                Err(Error::Cancelled) => break,
                Err(e) => {
                    // drain before surfacing a coordinator-level failure
                    while let Some(finished) = workers.join_next().await {
                        log_worker_exit(finished);
                    }
                    return Err(e);
                }
            }
            if self.backfill_complete() {
                info!("backfill complete, stopping");
                break;
            }
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!("draining in-flight polling workers");
        while let Some(finished) = workers.join_next().await {
            log_worker_exit(finished);
        }
        info!("poller stopped");
        Ok(())
    }

    /// One polling cycle: compute each group's next window and fan the due
    /// groups out as worker tasks. Groups still busy from a previous cycle
    /// are skipped by the scheduler.
    async fn run_cycle(
        &self,
        cancel: &CancellationToken,
        workers: &mut JoinSet<(String, Result<()>)>,
    ) -> Result<()> {
        let now_millis = Utc::now().timestamp_millis();
        let end_override = self.config.end_time.map(|t| t.timestamp_millis());

        for target in &self.config.targets {
            let Some(position) = self.position(&target.group_name) else {
                // positions are loaded for every target at startup
                warn!(group = target.group_name, "no position for group, skipping");
                continue;
            };
            if next_window(position.timestamp, now_millis, end_override).is_none() {
                debug!(group = target.group_name, "group caught up, nothing to poll");
                continue;
            }
            let Some(guard) = self.scheduler.admit(&target.group_name, cancel).await? else {
                continue;
            };
            // a previous worker may have advanced the position while we
            // waited at the gate; the group is exclusively ours now, so
            // recompute the window from the current checkpoint
            let Some(checkpoint) = self.position(&target.group_name) else {
                continue;
            };
            let Some(window) = next_window(checkpoint.timestamp, now_millis, end_override) else {
                continue;
            };

            poller_metrics().inflight_workers.inc();
            let worker = GroupWorker {
                target: target.clone(),
                window,
                checkpoint,
                region: Arc::clone(&self.region),
                labels: group_labels(self.region.as_ref(), &target.group_name),
                client: Arc::clone(&self.client),
                processor: Arc::clone(&self.processor),
                store: Arc::clone(&self.store),
                pacing: self.pacing.clone(),
                positions: Arc::clone(&self.positions),
                cancel: cancel.clone(),
            };
            let group = target.group_name.clone();
            workers.spawn(async move {
                let res = worker.poll(guard).await;
                poller_metrics().inflight_workers.dec();
                (group, res)
            });
        }
        Ok(())
    }

    /// Reads every group's checkpoint once. Groups without a stored entry
    /// start from the configured historical start, or from now when tailing.
    async fn load_checkpoints(&self) -> Result<()> {
        let default_start = match self.config.start_time {
            Some(start) => start.timestamp_millis(),
            None => Utc::now().timestamp_millis(),
        };
        let mut positions = HashMap::with_capacity(self.config.targets.len());
        for target in &self.config.targets {
            let checkpoint = match self.store.get(&target.group_name).await? {
                Some(checkpoint) => {
                    info!(
                        group = target.group_name,
                        position = checkpoint.timestamp,
                        "resuming from stored checkpoint"
                    );
                    checkpoint
                }
                None => Checkpoint::new(default_start),
            };
            positions.insert(target.group_name.clone(), checkpoint);
        }
        *self.positions.lock() = positions;
        Ok(())
    }

    fn position(&self, group: &str) -> Option<Checkpoint> {
        self.positions.lock().get(group).cloned()
    }

    fn backfill_complete(&self) -> bool {
        let Some(end) = self.config.end_time else {
            return false;
        };
        let end_millis = end.timestamp_millis();
        let positions = self.positions.lock();
        self.config.targets.iter().all(|target| {
            positions
                .get(&target.group_name)
                .is_some_and(|checkpoint| checkpoint.timestamp >= end_millis)
        })
    }
}

/// One polling task: fetches one window for one group.
struct GroupWorker<C, P, S> {
    target: LogGroupTarget,
    window: TimeWindow,
    checkpoint: Checkpoint,
    region: Arc<str>,
    labels: Vec<(String, String)>,
    client: Arc<C>,
    processor: Arc<P>,
    store: Arc<S>,
    pacing: PacingGate,
    positions: Positions,
    cancel: CancellationToken,
}

impl<C, P, S> GroupWorker<C, P, S>
where
    C: QueryClient + Send + Sync + 'static,
    P: EventProcessor + Send + Sync + 'static,
    S: CheckpointStore + Send + Sync + 'static,
{
    /// Drains every page of the window, filters boundary duplicates, forwards
    /// the batch and advances the checkpoint. The guard restores the group to
    /// idle on every exit path.
    async fn poll(self, guard: InflightGuard) -> Result<()> {
        let group = self.target.group_name.as_str();

        let events = self.list_window().await?;
        guard.mark_processing();

        let fresh = self.checkpoint.filter_new(events);
        let next = if fresh.is_empty() {
            // nothing new in the window; the position still moves to the
            // window end so a quiet group does not re-scan the same range
            Checkpoint::new(self.window.end_millis)
        } else {
            self.checkpoint.advanced(&fresh)
        };

        if !fresh.is_empty() {
            debug!(group, count = fresh.len(), window = %self.window, "forwarding events");
            let group_tag: Arc<str> = Arc::from(group);
            let batch: Vec<LogRecord> = fresh
                .into_iter()
                .map(|event| LogRecord::tag(event, &group_tag, &self.region))
                .collect();
            self.processor.process(batch).await?;
            poller_metrics()
                .batches_processed
                .get_or_create(&self.labels)
                .inc();
        }

        self.store.put(group, next.clone()).await?;
        self.positions.lock().insert(group.to_string(), next);
        Ok(())
    }

    /// Listing phase: one paced request per page until the remote stops
    /// returning a continuation token. A truncated window is incomplete and
    /// never reaches the checkpoint.
    async fn list_window(&self) -> Result<Vec<RawLogEvent>> {
        let group = self.target.group_name.as_str();
        let mut events = vec![];
        let mut continuation: Option<String> = None;
        loop {
            self.pacing.pace(&self.cancel).await?;

            let page = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                page = self.client.fetch(&self.target, self.window, continuation.take()) => page,
            };
            let page = match page {
                Ok(page) => page,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    poller_metrics()
                        .api_call_errors
                        .get_or_create(&self.labels)
                        .inc();
                    return Err(e);
                }
            };

            poller_metrics()
                .events_received
                .get_or_create(&self.labels)
                .inc_by(page.events.len() as u64);
            events.extend(page.events);

            match page.next_token {
                Some(token) => {
                    debug!(group, window = %self.window, "response truncated, fetching next page");
                    continuation = Some(token);
                }
                None => break,
            }
        }
        Ok(events)
    }
}

fn log_worker_exit(finished: std::result::Result<(String, Result<()>), JoinError>) {
    match finished {
        Ok((group, Ok(()))) => debug!(group, "polling task finished"),
        Ok((group, Err(Error::Cancelled))) => {
            info!(group, "polling task cancelled during shutdown");
        }
        Ok((group, Err(e))) => {
            error!(group, ?e, "polling task failed, the window will be retried next cycle");
        }
        Err(e) => error!(?e, "polling task panicked or was aborted"),
    }
}
