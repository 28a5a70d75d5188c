//! # Event Bus
//!
//! The root of a bus tree. Publishers hand events to the root; the root
//! relays them to every subscriber attached to it.

use std::sync::Arc;

use pubsub_telemetry::metrics::EVENTS_PUBLISHED;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::error::BusResult;
use crate::events::Event;
use crate::lifecycle::NodeStatus;
use crate::node::{Node, NodeLink};
use crate::subscriber::Subscriber;

/// In-process event bus.
///
/// Cheap to clone; all clones publish into the same root. The root is
/// closed once [`EventBus::close`] is called or the last clone is dropped.
///
/// A slow subscriber only grows its own buffer: [`EventBus::publish`]
/// returns as soon as the root's loop has accepted the event.
pub struct EventBus<E> {
    inner: Arc<RootHandle<E>>,
}

struct RootHandle<E> {
    link: NodeLink<E>,
    config: Arc<BusConfig>,
}

impl<E> Drop for RootHandle<E> {
    fn drop(&mut self) {
        self.link.close();
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> EventBus<E> {
    /// Create a new bus with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::spawn(Arc::new(BusConfig::default()))
    }

    /// Create a new bus with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidConfig` if the configuration is rejected by
    /// [`BusConfig::validate`].
    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self::spawn(Arc::new(config)))
    }

    fn spawn(config: Arc<BusConfig>) -> Self {
        let link = Node::spawn_root(Arc::clone(&config));
        debug!(node = %link.id(), buffer_limit = ?config.buffer_limit, "Event bus started");
        Self {
            inner: Arc::new(RootHandle { link, config }),
        }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns once the root has accepted the event; delivery to
    /// subscribers happens afterwards.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotRunning` if the bus is shutting down or done.
    pub async fn publish(&self, event: E) -> BusResult<()> {
        self.inner.link.publish(event).await?;
        EVENTS_PUBLISHED.inc();
        trace!(node = %self.inner.link.id(), "Event published");
        Ok(())
    }

    /// Open a new subscription that observes every event published after
    /// this call returns.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotRunning` if the bus is shutting down or done.
    pub async fn subscribe(&self) -> BusResult<Subscriber<E>> {
        self.inner.link.subscribe().await
    }
}

impl<E> EventBus<E> {
    /// Identity of the root node.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.link.id()
    }

    /// Current lifecycle status of the root.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.inner.link.status()
    }

    /// Whether the bus still accepts publishes and subscriptions.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.link.is_running()
    }

    /// Configuration shared by every node of this bus.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Request shutdown of the bus and every subscriber. Idempotent and
    /// non-blocking; await [`EventBus::done`] for completion.
    pub fn close(&self) {
        self.inner.link.close();
    }

    /// Resolves once the bus and all subscribers have finished.
    pub async fn done(&self) {
        self.inner.link.done().await;
    }

    /// Close the bus and wait for the whole tree to unwind.
    pub async fn shutdown(&self) {
        self.close();
        self.done().await;
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.inner.link.id())
            .field("status", &self.inner.link.status())
            .field("config", &self.inner.config)
            .finish()
    }
}
