//! Prometheus metrics for the event bus.
//!
//! All metrics follow the naming convention: `pubsub_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_published_total)
//! - **Gauge**: Value that can go up or down (e.g., subscribers_active)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Events accepted by a root (local or broker-backed)
    pub static ref EVENTS_PUBLISHED: Counter = Counter::new(
        "pubsub_events_published_total",
        "Total number of events accepted for publication"
    ).expect("metric creation failed");

    /// Events handed to a subscriber's reader
    pub static ref EVENTS_DELIVERED: Counter = Counter::new(
        "pubsub_events_delivered_total",
        "Total number of events delivered to subscribers"
    ).expect("metric creation failed");

    /// Events discarded before delivery
    pub static ref EVENTS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("pubsub_events_dropped_total", "Events discarded before delivery"),
        &["reason"]  // reason: drop-oldest/drop-newest/unknown_topic/decode
    ).expect("metric creation failed");

    /// Live subscriber nodes
    pub static ref SUBSCRIBERS_ACTIVE: Gauge = Gauge::new(
        "pubsub_subscribers_active",
        "Number of subscriber nodes currently running"
    ).expect("metric creation failed");
}

/// Handle to the registry the bus metrics live in.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless: metrics that are already
/// registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_DELIVERED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(SUBSCRIBERS_ACTIVE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
