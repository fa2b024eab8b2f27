//! Event types flowing through the poller: [RawLogEvent] as handed back by
//! the query API, and [LogRecord], the pipeline-ready record tagged with its
//! region and log group before it is forwarded to the event processor.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

/// One raw event from the remote query API. The identifier disambiguates
/// events sharing a timestamp at a window boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogEvent {
    pub event_id: String,
    /// Event timestamp in epoch milliseconds.
    pub timestamp: i64,
    pub log_stream: String,
    pub message: Bytes,
    /// When the remote system ingested the event, epoch milliseconds.
    pub ingestion_time: Option<i64>,
}

/// The record handed to the downstream processor.
/// NOTE: It is cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub event_id: String,
    pub event_time: DateTime<Utc>,
    pub value: Bytes,
    pub log_group: Arc<str>,
    pub log_stream: String,
    pub region: Arc<str>,
}

impl LogRecord {
    /// Tags a raw event with the group and region it was polled from.
    pub fn tag(event: RawLogEvent, log_group: &Arc<str>, region: &Arc<str>) -> Self {
        let event_time = Utc
            .timestamp_millis_opt(event.timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        LogRecord {
            event_id: event.event_id,
            event_time,
            value: event.message,
            log_group: Arc::clone(log_group),
            log_stream: event.log_stream,
            region: Arc::clone(region),
        }
    }
}
