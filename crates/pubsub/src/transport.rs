//! # Transport
//!
//! The publish/subscribe contract application code is written against.
//! Both the in-process tree ([`EventBus`]) and the broker adapter
//! ([`BrokerBus`](crate::broker::BrokerBus)) satisfy it, so callers never
//! depend on which backend is active.

use async_trait::async_trait;

use crate::bus::EventBus;
use crate::error::BusResult;
use crate::events::Event;
use crate::subscriber::Subscriber;

/// Publish/subscribe backend.
#[async_trait]
pub trait Transport<E: Event>: Send + Sync {
    /// Publish an event.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotRunning` once the transport is closed, or a
    /// backend-specific error.
    async fn publish(&self, event: E) -> BusResult<()>;

    /// Open a subscription to every event published afterwards.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotRunning` once the transport is closed.
    async fn subscribe(&self) -> BusResult<Subscriber<E>>;

    /// Request shutdown of the transport and all of its subscriptions.
    fn close(&self);

    /// Resolves once every subscription has finished.
    async fn done(&self);
}

#[async_trait]
impl<E: Event> Transport<E> for EventBus<E> {
    async fn publish(&self, event: E) -> BusResult<()> {
        EventBus::publish(self, event).await
    }

    async fn subscribe(&self) -> BusResult<Subscriber<E>> {
        EventBus::subscribe(self).await
    }

    fn close(&self) {
        EventBus::close(self);
    }

    async fn done(&self) {
        EventBus::done(self).await;
    }
}
