use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{Error, Result};

const DEFAULT_WORKER_COUNT: usize = 1;
const DEFAULT_PACING_INTERVAL_MILLIS: u64 = 200;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_pacing_interval_millis() -> u64 {
    DEFAULT_PACING_INTERVAL_MILLIS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// One unit of polling work: a named log group with an optional stream
/// selection. Immutable once the poller starts; reconfiguration requires a
/// restart.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogGroupTarget {
    pub group_name: String,
    /// Explicit stream names. A non-empty list takes precedence over
    /// `log_stream_prefix`, matching the remote API's own precedence rule.
    #[serde(default)]
    pub log_streams: Vec<String>,
    #[serde(default)]
    pub log_stream_prefix: Option<String>,
}

impl LogGroupTarget {
    /// A target polling every stream in `group_name`.
    pub fn new(group_name: impl Into<String>) -> Self {
        LogGroupTarget {
            group_name: group_name.into(),
            log_streams: vec![],
            log_stream_prefix: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.group_name.is_empty() {
            return Err(Error::Config("log group name must not be empty".to_string()));
        }
        if self.log_streams.iter().any(String::is_empty) {
            return Err(Error::Config(format!(
                "log group {} has an empty stream name",
                self.group_name
            )));
        }
        Ok(())
    }
}

/// Configuration consumed by the [crate::Poller]. Constructed by the caller
/// (configuration parsing and credential resolution live outside this crate)
/// and validated before any worker is spawned.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    pub region: String,
    pub targets: Vec<LogGroupTarget>,
    /// Maximum number of concurrently active polling workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Minimum spacing between outbound API requests, shared across all
    /// workers in the region. The remote quota is account/region-wide.
    #[serde(default = "default_pacing_interval_millis")]
    pub pacing_interval_millis: u64,
    /// Cadence of polling cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Historical start for groups without a stored checkpoint. When absent,
    /// groups tail from the moment the poller starts.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// End of a bounded historical backfill. When set, `run` returns once
    /// every group's checkpoint reaches it; when absent the poller tails
    /// continuously.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl PollerConfig {
    pub fn new(region: impl Into<String>, targets: Vec<LogGroupTarget>) -> Self {
        PollerConfig {
            region: region.into(),
            targets,
            worker_count: DEFAULT_WORKER_COUNT,
            pacing_interval_millis: DEFAULT_PACING_INTERVAL_MILLIS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            start_time: None,
            end_time: None,
        }
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::Config("region must not be empty".to_string()));
        }
        if self.worker_count == 0 {
            return Err(Error::Config(
                "worker_count must be a positive integer".to_string(),
            ));
        }
        if self.targets.is_empty() {
            return Err(Error::Config(
                "at least one log group target is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !seen.insert(target.group_name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate log group target {}",
                    target.group_name
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end <= start
        {
            return Err(Error::Config(format!(
                "end_time {end} must be later than start_time {start}"
            )));
        }
        Ok(())
    }
}
