//! # Node Engine
//!
//! One bus node = one tokio task owning its children, its buffer and its
//! status. Nothing outside the task touches that state; other nodes and
//! handles talk to it through the channels held in a [`NodeLink`].
//!
//! ```text
//!   publish ─────┐
//!   subscribe ───┤            ┌──────────────┐   publish   ┌───────┐
//!   demand ──────┼──────────► │  node loop   │ ──────────► │ child │ ...
//!   unsubscribe ─┘            │ (one task)   │ ──────────► │ child │ ...
//!                             └──────────────┘             └───────┘
//! ```
//!
//! A node with a [`Sink`] buffers every event it receives for a single
//! consumer. A node without one (the root) only relays.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use pubsub_telemetry::metrics::{EVENTS_DELIVERED, EVENTS_DROPPED, SUBSCRIBERS_ACTIVE};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::{BusConfig, OverflowPolicy};
use crate::error::{BusError, BusResult};
use crate::events::Event;
use crate::lifecycle::{Lifecycle, NodeStatus};
use crate::subscriber::Subscriber;

type SubscribeReply<E> = oneshot::Sender<Subscriber<E>>;

/// Everything needed to talk to a running node.
pub(crate) struct NodeLink<E> {
    id: Uuid,
    publish_tx: mpsc::Sender<E>,
    subscribe_tx: mpsc::Sender<SubscribeReply<E>>,
    demand_tx: Option<mpsc::UnboundedSender<oneshot::Sender<E>>>,
    lifecycle: Lifecycle,
}

impl<E> Clone for NodeLink<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            publish_tx: self.publish_tx.clone(),
            subscribe_tx: self.subscribe_tx.clone(),
            demand_tx: self.demand_tx.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<E> NodeLink<E> {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn status(&self) -> NodeStatus {
        self.lifecycle.status()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Hand `event` to the node's loop.
    pub(crate) async fn publish(&self, event: E) -> BusResult<()> {
        if !self.lifecycle.is_running() {
            return Err(BusError::NotRunning);
        }

        tokio::select! {
            biased;
            () = self.lifecycle.shutting_down() => Err(BusError::NotRunning),
            sent = self.publish_tx.send(event) => sent.map_err(|_| BusError::NotRunning),
        }
    }

    /// Ask the node's loop for a new sink child.
    pub(crate) async fn subscribe(&self) -> BusResult<Subscriber<E>> {
        if !self.lifecycle.is_running() {
            return Err(BusError::NotRunning);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::select! {
            biased;
            () = self.lifecycle.shutting_down() => return Err(BusError::NotRunning),
            sent = self.subscribe_tx.send(reply_tx) => sent.map_err(|_| BusError::NotRunning)?,
        }

        // The loop drops the reply sender if it exits first.
        reply_rx.await.map_err(|_| BusError::NotRunning)
    }

    /// Register demand for the next buffered event.
    ///
    /// The node sends the event into the returned receiver; it stays there
    /// until the receiver is awaited or dropped. `None` for relay-only
    /// nodes and once the node has stopped.
    pub(crate) fn request_event(&self) -> Option<oneshot::Receiver<E>> {
        let demand_tx = self.demand_tx.as_ref()?;
        let (event_tx, event_rx) = oneshot::channel();
        demand_tx.send(event_tx).ok()?;
        Some(event_rx)
    }

    pub(crate) fn close(&self) {
        if self.lifecycle.request_shutdown() {
            debug!(node = %self.id, "Shutdown requested");
        }
    }

    pub(crate) async fn shutting_down(&self) {
        self.lifecycle.shutting_down().await;
    }

    pub(crate) async fn done(&self) {
        self.lifecycle.done().await;
    }
}

/// Buffer and output side of a node in sink mode.
struct Sink<E> {
    buffer: VecDeque<E>,
    demand_rx: mpsc::UnboundedReceiver<oneshot::Sender<E>>,
    waiter: Option<oneshot::Sender<E>>,
}

impl<E> Sink<E> {
    fn push(&mut self, event: E, config: &BusConfig, node: Uuid) {
        let Some(limit) = config.buffer_limit else {
            self.buffer.push_back(event);
            return;
        };

        if self.buffer.len() < limit {
            self.buffer.push_back(event);
            return;
        }

        match config.overflow {
            OverflowPolicy::DropOldest => {
                self.buffer.pop_front();
                self.buffer.push_back(event);
            }
            OverflowPolicy::DropNewest => {}
        }
        EVENTS_DROPPED
            .with_label_values(&[config.overflow.as_str()])
            .inc();
        warn!(
            node = %node,
            limit = limit,
            policy = config.overflow.as_str(),
            "Subscriber buffer full, event dropped"
        );
    }

    /// Hand the head of the buffer to a waiting consumer, if there is one.
    fn deliver(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let Some(waiter) = self.waiter.take() else {
            return;
        };
        let Some(event) = self.buffer.pop_front() else {
            return;
        };

        match waiter.send(event) {
            Ok(()) => EVENTS_DELIVERED.inc(),
            // Consumer stopped waiting; keep the event at the head.
            Err(event) => self.buffer.push_front(event),
        }
    }
}

/// Outcome of one wait in the node loop.
enum Step<E> {
    Shutdown,
    Demand(oneshot::Sender<E>),
    Publish(E),
    Subscribe(SubscribeReply<E>),
    Unsubscribe(Uuid),
}

pub(crate) struct Node<E> {
    id: Uuid,
    config: Arc<BusConfig>,
    lifecycle: Lifecycle,
    children: HashMap<Uuid, NodeLink<E>>,
    sink: Option<Sink<E>>,
    publish_rx: mpsc::Receiver<E>,
    subscribe_rx: mpsc::Receiver<SubscribeReply<E>>,
    unsubscribe_tx: mpsc::UnboundedSender<Uuid>,
    unsubscribe_rx: mpsc::UnboundedReceiver<Uuid>,
    parent: Option<mpsc::UnboundedSender<Uuid>>,
}

impl<E: Event> Node<E> {
    /// Spawn a relay-only root node.
    pub(crate) fn spawn_root(config: Arc<BusConfig>) -> NodeLink<E> {
        Self::spawn(config, None, None)
    }

    /// Spawn a node and return a link to it.
    ///
    /// `seed` switches the node into sink mode with the given initial
    /// buffer; `parent` is where the node reports its own completion.
    fn spawn(
        config: Arc<BusConfig>,
        parent: Option<mpsc::UnboundedSender<Uuid>>,
        seed: Option<VecDeque<E>>,
    ) -> NodeLink<E> {
        let id = Uuid::new_v4();
        let lifecycle = Lifecycle::new();
        let (publish_tx, publish_rx) = mpsc::channel(config.command_capacity);
        let (subscribe_tx, subscribe_rx) = mpsc::channel(config.command_capacity);
        let (unsubscribe_tx, unsubscribe_rx) = mpsc::unbounded_channel();

        let (demand_tx, sink) = match seed {
            Some(buffer) => {
                let (demand_tx, demand_rx) = mpsc::unbounded_channel();
                let sink = Sink {
                    buffer,
                    demand_rx,
                    waiter: None,
                };
                (Some(demand_tx), Some(sink))
            }
            None => (None, None),
        };

        let node = Node {
            id,
            config,
            lifecycle: lifecycle.clone(),
            children: HashMap::new(),
            sink,
            publish_rx,
            subscribe_rx,
            unsubscribe_tx,
            unsubscribe_rx,
            parent,
        };

        debug!(
            node = %id,
            sink = node.sink.is_some(),
            seeded = node.sink.as_ref().map_or(0, |s| s.buffer.len()),
            "Node spawned"
        );
        if node.sink.is_some() {
            SUBSCRIBERS_ACTIVE.inc();
        }

        tokio::spawn(node.run());

        NodeLink {
            id,
            publish_tx,
            subscribe_tx,
            demand_tx,
            lifecycle,
        }
    }

    async fn run(mut self) {
        loop {
            if let Some(sink) = self.sink.as_mut() {
                sink.deliver();
            }

            let step = tokio::select! {
                biased;
                () = self.lifecycle.shutting_down() => Step::Shutdown,
                Some(waiter) = next_demand(&mut self.sink) => Step::Demand(waiter),
                Some(event) = self.publish_rx.recv() => Step::Publish(event),
                Some(reply) = self.subscribe_rx.recv() => Step::Subscribe(reply),
                Some(child) = self.unsubscribe_rx.recv() => Step::Unsubscribe(child),
                else => Step::Shutdown,
            };

            match step {
                Step::Shutdown => break,
                Step::Demand(waiter) => {
                    if let Some(sink) = self.sink.as_mut() {
                        sink.waiter = Some(waiter);
                    }
                }
                Step::Publish(event) => self.forward(event).await,
                Step::Subscribe(reply) => self.add_child(reply),
                Step::Unsubscribe(child) => {
                    self.children.remove(&child);
                    trace!(node = %self.id, child = %child, "Child unsubscribed");
                }
            }
        }

        self.shutdown().await;
    }

    async fn forward(&mut self, event: E) {
        if let Some(sink) = self.sink.as_mut() {
            sink.push(event.clone(), &self.config, self.id);
        }

        trace!(node = %self.id, children = self.children.len(), "Forwarding event");

        for child in self.children.values() {
            match child.publish(event.clone()).await {
                Ok(()) | Err(BusError::NotRunning) => {}
                Err(err) => panic!(
                    "bus node {} failed to forward to child {}: {err}",
                    self.id, child.id
                ),
            }
        }
    }

    fn add_child(&mut self, reply: SubscribeReply<E>) {
        let seed = self
            .sink
            .as_ref()
            .map(|sink| sink.buffer.clone())
            .unwrap_or_default();

        let link = Self::spawn(
            Arc::clone(&self.config),
            Some(self.unsubscribe_tx.clone()),
            Some(seed),
        );
        self.children.insert(link.id, link.clone());

        debug!(node = %self.id, child = %link.id, "Child subscribed");

        // If the requester went away the returned handle is dropped here,
        // which closes the child; it then unsubscribes like any other.
        let _ = reply.send(Subscriber::from_link(link));
    }

    async fn shutdown(mut self) {
        self.lifecycle.request_shutdown();

        debug!(
            node = %self.id,
            children = self.children.len(),
            "Node shutting down"
        );

        for child in self.children.values() {
            child.close();
        }

        while !self.children.is_empty() {
            match self.unsubscribe_rx.recv().await {
                Some(child) => {
                    self.children.remove(&child);
                }
                None => break,
            }
        }

        if self.sink.take().is_some() {
            SUBSCRIBERS_ACTIVE.dec();
        }

        self.lifecycle.mark_done();
        debug!(node = %self.id, "Node done");

        if let Some(parent) = self.parent.take() {
            // The parent may already be gone; nothing to notify then.
            let _ = parent.send(self.id);
        }
    }
}

async fn next_demand<E>(sink: &mut Option<Sink<E>>) -> Option<oneshot::Sender<E>> {
    match sink {
        Some(sink) => sink.demand_rx.recv().await,
        None => std::future::pending().await,
    }
}
