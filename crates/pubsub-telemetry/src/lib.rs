//! # Pubsub Telemetry
//!
//! Logging and metrics for the event bus.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered as text or JSON lines
//! - **Metrics**: Prometheus counters and gauges for publish, delivery and drops
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pubsub_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!
//!     // Bus logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `pubsub` | Service name in logs |
//! | `PUBSUB_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PUBSUB_JSON_LOGS` | `false` | Emit JSON lines |
//! | `PUBSUB_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PUBSUB_METRICS` | `true` | Register Prometheus metrics |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging, LoggingHandle};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, EVENTS_DELIVERED, EVENTS_DROPPED,
    EVENTS_PUBLISHED, SUBSCRIBERS_ACTIVE,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, when enabled, the bus metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Initialize metrics first so startup logs can already be counted
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let logging = init_logging(config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingHandle,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
