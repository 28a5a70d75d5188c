//! # Bus Configuration
//!
//! Sizing and overflow behaviour for subscriber buffers.

use std::env;
use std::str::FromStr;

use crate::error::BusError;

/// What a subscriber does when its buffer is full and another event arrives.
///
/// Publishers are never blocked or rejected because of a slow subscriber,
/// so every policy sheds events on the subscriber's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest undelivered event to make room.
    #[default]
    DropOldest,
    /// Discard the incoming event.
    DropNewest,
}

impl OverflowPolicy {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "drop-oldest",
            Self::DropNewest => "drop-newest",
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" | "oldest" => Ok(Self::DropOldest),
            "drop-newest" | "drop_newest" | "newest" => Ok(Self::DropNewest),
            other => Err(BusError::InvalidConfig(format!(
                "unknown overflow policy: {other}"
            ))),
        }
    }
}

/// Configuration shared by every node of one bus tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum buffered events per subscriber. `None` means unbounded.
    pub buffer_limit: Option<usize>,

    /// Policy applied once `buffer_limit` is reached.
    pub overflow: OverflowPolicy,

    /// Capacity of each node's publish inbox.
    pub command_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            buffer_limit: None,
            overflow: OverflowPolicy::default(),
            command_capacity: crate::DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PUBSUB_BUFFER_LIMIT`: per-subscriber buffer bound (default: unbounded)
    /// - `PUBSUB_OVERFLOW`: `drop-oldest` or `drop-newest` (default: drop-oldest)
    /// - `PUBSUB_COMMAND_CAPACITY`: publish inbox capacity (default: 1)
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidConfig` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, BusError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("PUBSUB_BUFFER_LIMIT") {
            let limit = raw.parse::<usize>().map_err(|e| {
                BusError::InvalidConfig(format!("PUBSUB_BUFFER_LIMIT={raw}: {e}"))
            })?;
            config.buffer_limit = Some(limit);
        }

        if let Ok(raw) = env::var("PUBSUB_OVERFLOW") {
            config.overflow = raw.parse()?;
        }

        if let Ok(raw) = env::var("PUBSUB_COMMAND_CAPACITY") {
            config.command_capacity = raw.parse::<usize>().map_err(|e| {
                BusError::InvalidConfig(format!("PUBSUB_COMMAND_CAPACITY={raw}: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Bound every subscriber buffer to `limit` events.
    #[must_use]
    pub fn with_buffer_limit(mut self, limit: usize, overflow: OverflowPolicy) -> Self {
        self.buffer_limit = Some(limit);
        self.overflow = overflow;
        self
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidConfig` for a zero buffer limit or a zero
    /// inbox capacity.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.buffer_limit == Some(0) {
            return Err(BusError::InvalidConfig(
                "buffer limit must be at least 1".into(),
            ));
        }
        if self.command_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "command capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
