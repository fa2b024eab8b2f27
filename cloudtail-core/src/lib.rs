//! cloudtail-core is the polling engine of a cloud log collector. The
//! poll-a-window loop executes the following for every configured log group
//! until a shutdown signal is received:
//! - Compute the group's next time window from its checkpoint
//! - Admit one worker per group through the bounded concurrency gate
//! - Fetch every page of the window from the query API, paced by one shared
//!   interval gate (the remote quota is account/region-wide)
//! - Filter boundary duplicates, hand the batch to the event processor
//! - Advance the group's checkpoint only after the processor accepts it
//!
//! The wire client, the checkpoint store and the downstream processor are
//! collaborator contracts ([QueryClient], [CheckpointStore],
//! [EventProcessor]); implementations live outside this crate.

mod error;
pub use crate::error::{Error, Result};

mod checkpoint;
mod config;
mod event;
mod metrics;
mod pacing;
mod poller;
mod processor;
mod query;
mod scheduler;
mod window;

pub use crate::checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use crate::config::{LogGroupTarget, PollerConfig};
pub use crate::event::{LogRecord, RawLogEvent};
pub use crate::metrics::encode_metrics;
pub use crate::pacing::PacingGate;
pub use crate::poller::Poller;
pub use crate::processor::{EventProcessor, LogEventProcessor};
pub use crate::query::{FetchPage, QueryClient};
pub use crate::scheduler::GroupState;
pub use crate::window::TimeWindow;
