//! Shared pacing of outbound API requests. The remote quota is
//! account/region-wide, so the gate is one schedule shared by every worker:
//! each call claims the next free slot and sleeps until it opens, keeping the
//! aggregate request rate bounded no matter the worker budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

#[derive(Clone)]
pub struct PacingGate {
    interval: Duration,
    next_slot: Arc<parking_lot::Mutex<Option<Instant>>>,
}

impl PacingGate {
    pub fn new(interval: Duration) -> Self {
        PacingGate {
            interval,
            next_slot: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Claims the next request slot and waits for it. Unblocks with
    /// [Error::Cancelled] when `cancel` fires mid-sleep.
    pub async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        if self.interval.is_zero() {
            return Ok(());
        }

        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }
}
