use crate::Result;
use crate::config::LogGroupTarget;
use crate::event::RawLogEvent;
use crate::window::TimeWindow;

/// One page of results from the remote query API. A `next_token` means the
/// response was truncated and the window is not exhausted yet; the caller
/// must keep fetching with the token before it may advance any checkpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchPage {
    pub events: Vec<RawLogEvent>,
    pub next_token: Option<String>,
}

/// Contract for the wire client of the remote log-aggregation API. The
/// concrete encoding lives outside this crate; implementations must return
/// [crate::Error::Cancelled] when a request is interrupted by shutdown so the
/// poller can tell expected drain from API failure.
#[trait_variant::make(Send)]
pub trait QueryClient {
    /// Requests events for `target` within `window`. A target with an empty
    /// stream list and no prefix selects every stream in the group.
    /// `continuation` carries the token of a previous truncated page, `None`
    /// for the first request of a window.
    async fn fetch(
        &self,
        target: &LogGroupTarget,
        window: TimeWindow,
        continuation: Option<String>,
    ) -> Result<FetchPage>;
}
