//! # Bus Errors
//!
//! Every failure the bus can report. Only [`BusError::NotRunning`] is part of
//! the normal operating contract; the rest are configuration or transport
//! faults.

use thiserror::Error;

/// Errors from bus, subscriber and transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The target node has begun or completed shutdown.
    #[error("event bus is not running")]
    NotRunning,

    /// A topic was registered twice in the same type registry.
    #[error("topic {topic} is already registered")]
    AlreadyRegistered { topic: String },

    /// A message arrived for a topic with no registered shape.
    #[error("no event shape registered for topic {topic}")]
    UnknownTopic { topic: String },

    /// A payload could not be reconstructed into its registered shape.
    #[error("failed to decode payload on topic {topic}: {reason}")]
    Decode { topic: String, reason: String },

    /// An event could not be serialized for the broker.
    #[error("failed to encode event on topic {topic}: {reason}")]
    Encode { topic: String, reason: String },

    /// The external broker rejected or failed an operation.
    #[error("broker error: {0}")]
    Broker(String),

    /// Configuration read from the environment was malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BusError {
    /// Whether the error only signals that the target has stopped.
    #[must_use]
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning)
    }
}

/// Convenience alias for bus results.
pub type BusResult<T> = Result<T, BusError>;
