//! Poller metrics. Counters are fire-and-forget and updated on receipt,
//! independent of downstream success, so API-side volume stays visible even
//! when the pipeline drops events.

use std::sync::OnceLock;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// Define the labels for the metrics
const REGION_LABEL: &str = "region";
const GROUP_LABEL: &str = "log_group";

// The registry is created with the global prefix
const REGISTRY_PREFIX: &str = "cloudtail";

// Define the metrics
// Note: We do not add a suffix to the metric name, as the suffix is inferred
// through the metric type by the prometheus client library
const EVENTS_RECEIVED: &str = "events_received";
const API_CALL_ERRORS: &str = "api_call_errors";
const BATCHES_PROCESSED: &str = "batches_processed";
const INFLIGHT_WORKERS: &str = "inflight_workers";

/// The global register of all metrics.
#[derive(Default)]
struct GlobalRegistry {
    // It is okay to use a sync mutex because we register each metric only once.
    registry: parking_lot::Mutex<Registry>,
}

static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(GlobalRegistry::default)
}

/// Metrics aggregated by the poller across all group workers.
pub(crate) struct PollerMetrics {
    /// Events returned by the query API, counted on receipt.
    pub(crate) events_received: Family<Vec<(String, String)>, Counter>,
    /// Query API failures. Cancellations during shutdown are not counted.
    pub(crate) api_call_errors: Family<Vec<(String, String)>, Counter>,
    /// Batches the event processor accepted.
    pub(crate) batches_processed: Family<Vec<(String, String)>, Counter>,
    /// Workers currently holding a gate permit.
    pub(crate) inflight_workers: Gauge,
}

impl PollerMetrics {
    fn new() -> Self {
        let metrics = Self {
            events_received: Family::<Vec<(String, String)>, Counter>::default(),
            api_call_errors: Family::<Vec<(String, String)>, Counter>::default(),
            batches_processed: Family::<Vec<(String, String)>, Counter>::default(),
            inflight_workers: Gauge::default(),
        };

        let mut registry = global_registry().registry.lock();
        let registry = registry.sub_registry_with_prefix(REGISTRY_PREFIX);
        registry.register(
            EVENTS_RECEIVED,
            "Total number of log events received from the query API",
            metrics.events_received.clone(),
        );
        registry.register(
            API_CALL_ERRORS,
            "Total number of failed query API calls",
            metrics.api_call_errors.clone(),
        );
        registry.register(
            BATCHES_PROCESSED,
            "Total number of event batches accepted by the downstream processor",
            metrics.batches_processed.clone(),
        );
        registry.register(
            INFLIGHT_WORKERS,
            "Number of polling workers currently active",
            metrics.inflight_workers.clone(),
        );
        metrics
    }
}

static POLLER_METRICS: OnceLock<PollerMetrics> = OnceLock::new();

pub(crate) fn poller_metrics() -> &'static PollerMetrics {
    POLLER_METRICS.get_or_init(PollerMetrics::new)
}

pub(crate) fn group_labels(region: &str, group: &str) -> Vec<(String, String)> {
    vec![
        (REGION_LABEL.to_string(), region.to_string()),
        (GROUP_LABEL.to_string(), group.to_string()),
    ]
}

/// Renders the registry in the Prometheus text exposition format. Exposing it
/// over HTTP is the embedder's concern.
pub fn encode_metrics() -> crate::Result<String> {
    let mut buffer = String::new();
    encode(&mut buffer, &global_registry().registry.lock())
        .map_err(|e| crate::Error::Other(format!("encoding metrics: {e}")))?;
    Ok(buffer)
}
