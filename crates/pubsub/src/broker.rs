//! # Broker Transport
//!
//! Carries events through an external pub/sub service so they fan out
//! across process boundaries.
//!
//! ```text
//!  publish(E) ──► topic + JSON ──► Broker ──► stream ──► decode ──► sink node ──► Subscriber
//!                                                       (registry)
//! ```
//!
//! Each subscription is a sink node fed by a pump task. Clones of that
//! subscriber are ordinary children of the sink, so they inherit its
//! undelivered buffer exactly as in-process clones do.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use pubsub_telemetry::metrics::{EVENTS_DROPPED, EVENTS_PUBLISHED};
use tracing::{debug, trace, warn};

use crate::bus::EventBus;
use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::events::TopicEvent;
use crate::node::NodeLink;
use crate::registry::TypeRegistry;
use crate::subscriber::Subscriber;
use crate::topic::TopicPattern;
use crate::transport::Transport;

/// A raw message as seen on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Topic (channel) the message was published on.
    pub topic: String,
    /// Serialized payload.
    pub payload: Vec<u8>,
}

/// Stream of raw messages matching a subscription's patterns.
pub type BrokerStream = BoxStream<'static, BrokerMessage>;

/// Client for an external pub/sub service.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Broker` if the service rejects the message.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Open a stream of messages whose topic matches any of `patterns`.
    ///
    /// Messages published after this call returns must appear on the
    /// stream. The stream ends if the connection is lost.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Broker` if the subscription cannot be opened.
    async fn subscribe(&self, patterns: &[TopicPattern]) -> BusResult<BrokerStream>;
}

/// Event bus backed by a [`Broker`].
///
/// Events are published under their own topic; subscribers choose topics
/// with patterns and receive values rebuilt through the bus's
/// [`TypeRegistry`].
pub struct BrokerBus<E, B> {
    broker: Arc<B>,
    registry: Arc<TypeRegistry<E>>,
    // Anchor for every subscription sink, so closing the bus cascades.
    root: EventBus<E>,
}

impl<E: TopicEvent, B: Broker> BrokerBus<E, B> {
    /// Create a broker-backed bus with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(broker: B, registry: TypeRegistry<E>) -> Self {
        Self {
            broker: Arc::new(broker),
            registry: Arc::new(registry),
            root: EventBus::new(),
        }
    }

    /// Create a broker-backed bus whose subscriber buffers follow `config`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidConfig` if the configuration is rejected.
    pub fn with_config(
        broker: B,
        registry: TypeRegistry<E>,
        config: BusConfig,
    ) -> BusResult<Self> {
        Ok(Self {
            broker: Arc::new(broker),
            registry: Arc::new(registry),
            root: EventBus::with_config(config)?,
        })
    }

    /// Publish an event under `event.topic()`.
    ///
    /// # Errors
    ///
    /// - `BusError::NotRunning` - The bus was closed
    /// - `BusError::Encode` - The event could not be serialized
    /// - `BusError::Broker` - The broker rejected the message
    pub async fn publish(&self, event: E) -> BusResult<()> {
        if !self.root.is_running() {
            return Err(BusError::NotRunning);
        }

        let payload = event.encode()?;
        self.broker.publish(event.topic(), payload).await?;

        EVENTS_PUBLISHED.inc();
        trace!(topic = event.topic(), "Event published to broker");
        Ok(())
    }

    /// Subscribe to every topic.
    ///
    /// # Errors
    ///
    /// Same as [`BrokerBus::subscribe_topics`].
    pub async fn subscribe(&self) -> BusResult<Subscriber<E>> {
        self.subscribe_topics(&["*"]).await
    }

    /// Subscribe to topics matching any of `topics`; a trailing `*` makes a
    /// pattern match every topic with that prefix.
    ///
    /// # Errors
    ///
    /// - `BusError::NotRunning` - The bus was closed
    /// - `BusError::Broker` - The broker subscription failed
    pub async fn subscribe_topics<S: AsRef<str>>(
        &self,
        topics: &[S],
    ) -> BusResult<Subscriber<E>> {
        let patterns: Vec<TopicPattern> = topics
            .iter()
            .map(|topic| TopicPattern::parse(topic.as_ref()))
            .collect();

        let sink = self.root.subscribe().await?;
        let stream = match self.broker.subscribe(&patterns).await {
            Ok(stream) => stream,
            Err(err) => {
                sink.close();
                return Err(err);
            }
        };

        debug!(
            node = %sink.id(),
            topics = ?patterns.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Broker subscription opened"
        );

        tokio::spawn(pump(
            stream,
            sink.link().clone(),
            Arc::clone(&self.registry),
        ));

        Ok(sink)
    }

    /// The registry used to rebuild received events.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry<E> {
        &self.registry
    }

    /// Whether the bus still accepts publishes and subscriptions.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.root.is_running()
    }

    /// Close the bus and every subscription opened through it.
    pub fn close(&self) {
        self.root.close();
    }

    /// Resolves once every subscription has finished.
    pub async fn done(&self) {
        self.root.done().await;
    }
}

#[async_trait]
impl<E: TopicEvent, B: Broker> Transport<E> for BrokerBus<E, B> {
    async fn publish(&self, event: E) -> BusResult<()> {
        BrokerBus::publish(self, event).await
    }

    async fn subscribe(&self) -> BusResult<Subscriber<E>> {
        BrokerBus::subscribe(self).await
    }

    fn close(&self) {
        BrokerBus::close(self);
    }

    async fn done(&self) {
        BrokerBus::done(self).await;
    }
}

/// Move messages from the broker stream into a subscription sink until
/// either side stops.
async fn pump<E: TopicEvent>(
    mut stream: BrokerStream,
    sink: NodeLink<E>,
    registry: Arc<TypeRegistry<E>>,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = sink.shutting_down() => break,
            next = stream.next() => match next {
                Some(message) => message,
                None => {
                    debug!(node = %sink.id(), "Broker stream ended");
                    sink.close();
                    break;
                }
            },
        };

        let event = match registry.decode(&message.topic, &message.payload) {
            Ok(event) => event,
            Err(err) => {
                let reason = match err {
                    BusError::UnknownTopic { .. } => "unknown_topic",
                    _ => "decode",
                };
                EVENTS_DROPPED.with_label_values(&[reason]).inc();
                warn!(node = %sink.id(), topic = %message.topic, error = %err, "Dropping broker message");
                continue;
            }
        };

        if sink.publish(event).await.is_err() {
            break;
        }
    }

    trace!(node = %sink.id(), "Broker pump stopped");
}
