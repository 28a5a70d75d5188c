//! # Subscriber
//!
//! Consumer-side handle of a sink node.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::oneshot;
use tokio_stream::Stream;
use uuid::Uuid;

use crate::error::BusResult;
use crate::events::Event;
use crate::lifecycle::NodeStatus;
use crate::node::NodeLink;

/// A live feed of events from the node it was subscribed to.
///
/// Events arrive in the order they reached the parent node. A subscriber
/// has exactly one reader; to hand the feed to another component use
/// [`Subscriber::try_clone`], which never loses events that are still
/// buffered.
///
/// Dropping the handle closes the subscriber and everything cloned from it.
pub struct Subscriber<E> {
    link: NodeLink<E>,
    // Demand already registered with the node; may hold a handed-over event.
    pending: Option<oneshot::Receiver<E>>,
}

impl<E> Subscriber<E> {
    pub(crate) fn from_link(link: NodeLink<E>) -> Self {
        Self {
            link,
            pending: None,
        }
    }

    pub(crate) fn link(&self) -> &NodeLink<E> {
        &self.link
    }

    /// Unique identity of this subscriber's node.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.link.id()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.link.status()
    }

    /// Whether the subscriber still accepts events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.link.is_running()
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The oldest undelivered event
    /// - `None` - The subscriber was closed
    ///
    /// Cancel safe: if the returned future is dropped before it resolves,
    /// the event it was waiting for is returned by the next call.
    pub async fn recv(&mut self) -> Option<E> {
        if self.pending.is_none() {
            self.pending = Some(self.link.request_event()?);
        }
        let pending = self.pending.as_mut()?;

        let event = tokio::select! {
            biased;
            event = pending => event.ok(),
            () = self.link.shutting_down() => None,
        };
        self.pending = None;
        event
    }

    /// Create a sibling feed that starts with every event still buffered
    /// here, followed by everything published afterwards.
    ///
    /// The clone is attached below this subscriber, so closing this
    /// subscriber also closes the clone.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotRunning` if this subscriber is shutting down.
    pub async fn try_clone(&self) -> BusResult<Subscriber<E>> {
        self.link.subscribe().await
    }

    /// Request shutdown of this subscriber and its clones. Idempotent.
    pub fn close(&self) {
        self.link.close();
    }

    /// Resolves once this subscriber and all of its clones have finished.
    pub async fn done(&self) {
        self.link.done().await;
    }

    /// Turn the subscriber into a [`Stream`] that ends when it is closed.
    #[must_use]
    pub fn into_stream(self) -> EventStream<E>
    where
        E: Event,
    {
        let inner = stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
        .boxed();
        EventStream { inner }
    }
}

impl<E> std::fmt::Debug for Subscriber<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.link.id())
            .field("status", &self.link.status())
            .finish()
    }
}

impl<E> Drop for Subscriber<E> {
    fn drop(&mut self) {
        self.link.close();
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream<E> {
    inner: BoxStream<'static, E>,
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
