use tracing::info;

use crate::Result;
use crate::event::LogRecord;

/// Downstream sink for polled events. Records arrive already tagged with
/// their region and log group. Implementations are called concurrently from
/// multiple group workers; a batch either succeeds as a whole or fails as a
/// whole, and a failed batch is re-fetched and re-offered on the next cycle.
#[trait_variant::make(Send)]
pub trait EventProcessor {
    async fn process(&self, batch: Vec<LogRecord>) -> Result<()>;
}

/// Processor that writes every record to the log. Useful as a pipeline
/// placeholder during bring-up.
#[derive(Debug, Clone, Default)]
pub struct LogEventProcessor;

impl EventProcessor for LogEventProcessor {
    async fn process(&self, batch: Vec<LogRecord>) -> Result<()> {
        for record in batch {
            info!(
                group = record.log_group.as_ref(),
                stream = record.log_stream,
                region = record.region.as_ref(),
                event_time = %record.event_time,
                "{}",
                String::from_utf8_lossy(&record.value)
            );
        }
        Ok(())
    }
}
