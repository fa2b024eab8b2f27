use std::fmt;

use crate::{Error, Result};

/// Half-open interval `[start_millis, end_millis)` of epoch milliseconds over
/// which events are requested. Consecutive windows for one group never skip
/// time: the next window starts at the previous checkpoint position, so they
/// overlap at the boundary timestamp and the checkpoint's duplicate set
/// disambiguates re-observed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl TimeWindow {
    pub fn new(start_millis: i64, end_millis: i64) -> Result<Self> {
        if end_millis <= start_millis {
            return Err(Error::Config(format!(
                "invalid time window: end {end_millis} must be later than start {start_millis}"
            )));
        }
        Ok(TimeWindow {
            start_millis,
            end_millis,
        })
    }

    pub fn contains(&self, timestamp_millis: i64) -> bool {
        timestamp_millis >= self.start_millis && timestamp_millis < self.end_millis
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_millis, self.end_millis)
    }
}

/// The next window for a group sitting at `position` (its checkpoint
/// timestamp). Returns `None` when the group is caught up, or when a
/// configured backfill end has been reached.
pub(crate) fn next_window(
    position: i64,
    now_millis: i64,
    end_override: Option<i64>,
) -> Option<TimeWindow> {
    let end = match end_override {
        Some(end) => end.min(now_millis),
        None => now_millis,
    };
    if end <= position {
        return None;
    }
    Some(TimeWindow {
        start_millis: position,
        end_millis: end,
    })
}
