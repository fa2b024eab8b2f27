use aws_sdk_cloudwatchlogs::Client;
use bytes::Bytes;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use cloudtail_core::{FetchPage, LogGroupTarget, QueryClient, RawLogEvent, TimeWindow};

use crate::client::create_cloudwatch_client;
use crate::{Error, Result};

/// Page size the original FilterLogEvents quota guidance is tuned for.
const DEFAULT_PAGE_LIMIT: i32 = 100;
const MAX_PAGE_LIMIT: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudwatchQueryConfig {
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Events per page, 1..=10000.
    #[serde(default)]
    pub page_limit: Option<i32>,
}

impl CloudwatchQueryConfig {
    pub fn new(region: impl Into<String>) -> Self {
        CloudwatchQueryConfig {
            region: region.into(),
            endpoint_url: None,
            page_limit: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::InvalidConfig("region must not be empty".to_string()));
        }
        if let Some(limit) = self.page_limit
            && !(1..=MAX_PAGE_LIMIT).contains(&limit)
        {
            return Err(Error::InvalidConfig(format!(
                "page_limit {limit} must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// [cloudtail_core::QueryClient] over the CloudWatch Logs FilterLogEvents
/// API. Clones share one SDK client and one cancellation token.
#[derive(Clone)]
pub struct CloudwatchQueryClient {
    client: Client,
    page_limit: i32,
    cancel: CancellationToken,
}

impl CloudwatchQueryClient {
    /// `client` injects a preconfigured SDK client (used by tests); `None`
    /// builds one from the config.
    pub async fn new(config: CloudwatchQueryConfig, client: Option<Client>) -> Result<Self> {
        config.validate()?;
        let sdk_client = match client {
            Some(client) => client,
            None => create_cloudwatch_client(Some(config.clone())).await?,
        };
        Ok(CloudwatchQueryClient {
            client: sdk_client,
            page_limit: config.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            cancel: CancellationToken::new(),
        })
    }

    /// Ties in-flight requests to `cancel`: a fetch interrupted by it returns
    /// the distinguishable cancelled error instead of hanging out a shutdown.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Stream selection for one request. A non-empty explicit list wins over the
/// prefix, matching the remote API's own precedence rule; neither means
/// every stream in the group.
fn stream_selection(target: &LogGroupTarget) -> (Option<Vec<String>>, Option<String>) {
    if !target.log_streams.is_empty() {
        (Some(target.log_streams.clone()), None)
    } else {
        (None, target.log_stream_prefix.clone())
    }
}

impl QueryClient for CloudwatchQueryClient {
    async fn fetch(
        &self,
        target: &LogGroupTarget,
        window: TimeWindow,
        continuation: Option<String>,
    ) -> cloudtail_core::Result<FetchPage> {
        let (stream_names, stream_prefix) = stream_selection(target);
        let request = self
            .client
            .filter_log_events()
            .log_group_name(&target.group_name)
            .start_time(window.start_millis)
            .end_time(window.end_millis)
            .limit(self.page_limit)
            .set_log_stream_names(stream_names)
            .set_log_stream_name_prefix(stream_prefix)
            .set_next_token(continuation);

        let response = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(Error::Cancelled.into()),
            response = request.send() => response,
        };

        let output = match response {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(
                    ?err,
                    group = target.group_name,
                    "FilterLogEvents request failed"
                );
                return Err(Error::CloudWatch(err.into()).into());
            }
        };

        let events = output
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|event| RawLogEvent {
                event_id: event.event_id.unwrap_or_default(),
                timestamp: event.timestamp.unwrap_or_default(),
                log_stream: event.log_stream_name.unwrap_or_default(),
                message: Bytes::from(event.message.unwrap_or_default()),
                ingestion_time: event.ingestion_time,
            })
            .collect();

        Ok(FetchPage {
            events,
            next_token: output.next_token,
        })
    }
}
