//! # Pubsub - In-Process Event Bus
//!
//! A publish/subscribe tree that lets components observe domain events
//! without coupling to each other or to each other's speed.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!   publish() ─────► │   EventBus   │  root: relays only
//!                    └──────┬───────┘
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!        ┌────────────┐          ┌────────────┐
//!        │ Subscriber │          │ Subscriber │  sink: buffers for one reader
//!        └─────┬──────┘          └────────────┘
//!              ▼ try_clone()
//!        ┌────────────┐
//!        │ Subscriber │  inherits the undelivered buffer
//!        └────────────┘
//! ```
//!
//! ## Rules
//!
//! - Every node is its own task; nodes only exchange messages.
//! - A stalled reader grows its own buffer and nothing else.
//! - Closing a node closes its whole subtree; `done()` resolves only after
//!   every descendant has finished.
//! - After shutdown begins, `publish` and `subscribe` return
//!   [`BusError::NotRunning`].
//!
//! ## Transports
//!
//! [`Transport`] is implemented by [`EventBus`] and by [`BrokerBus`], which
//! carries events through an external [`Broker`] ([`MemoryBroker`], or
//! `RedisBroker` with the `redis` feature) and rebuilds them through a
//! [`TypeRegistry`].

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod memory;
mod node;
#[cfg(feature = "redis")]
pub mod redis_broker;
pub mod registry;
pub mod subscriber;
pub mod topic;
pub mod transport;

// Re-export main types
pub use broker::{Broker, BrokerBus, BrokerMessage, BrokerStream};
pub use bus::EventBus;
pub use config::{BusConfig, OverflowPolicy};
pub use error::{BusError, BusResult};
pub use events::{decode_shape, encode_shape, Event, EventShape, TopicEvent};
pub use lifecycle::NodeStatus;
pub use memory::MemoryBroker;
#[cfg(feature = "redis")]
pub use redis_broker::RedisBroker;
pub use registry::TypeRegistry;
pub use subscriber::{EventStream, Subscriber};
pub use topic::TopicPattern;
pub use transport::Transport;

/// Default capacity of each node's publish and subscribe inboxes.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1;
