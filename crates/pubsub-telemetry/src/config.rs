//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `pubsub=debug,info`
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to register the bus metrics with the Prometheus registry
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pubsub".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: pubsub)
    /// - `PUBSUB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PUBSUB_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `PUBSUB_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `PUBSUB_METRICS`: Register Prometheus metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "pubsub".to_string()),

            log_level: env::var("PUBSUB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("PUBSUB_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("PUBSUB_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            metrics_enabled: env::var("PUBSUB_METRICS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }

    /// Configuration for a named component embedding the bus.
    pub fn for_service(name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("pubsub-{name}");
        config
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "true" || value == "1" || value == "yes"
}
