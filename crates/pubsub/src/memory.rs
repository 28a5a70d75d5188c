//! # In-Memory Broker
//!
//! Loopback [`Broker`] for single-process deployments and tests.
//!
//! Uses `tokio::sync::broadcast`, so a subscription that falls more than
//! `capacity` messages behind skips the oldest ones (logged at `warn`).

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{trace, warn};

use crate::broker::{Broker, BrokerMessage, BrokerStream};
use crate::error::BusResult;
use crate::topic::TopicPattern;

/// Default number of in-flight messages per broker.
pub const DEFAULT_BROKER_CAPACITY: usize = 1024;

/// Broker that lives entirely inside the current process.
///
/// Cheap to clone; all clones share one channel.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    sender: broadcast::Sender<BrokerMessage>,
    capacity: usize,
}

impl MemoryBroker {
    /// Create a broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROKER_CAPACITY)
    }

    /// Create a broker with specified capacity (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of open broker streams.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        let message = BrokerMessage {
            topic: topic.to_string(),
            payload,
        };

        // No receivers is fine: nobody is listening on that topic.
        if let Ok(receivers) = self.sender.send(message) {
            trace!(topic = topic, receivers = receivers, "Broker message sent");
        }
        Ok(())
    }

    async fn subscribe(&self, patterns: &[TopicPattern]) -> BusResult<BrokerStream> {
        let patterns = patterns.to_vec();
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            let message = match item {
                Ok(message) if TopicPattern::any_matches(&patterns, &message.topic) => Some(message),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Broker subscription lagged, messages dropped");
                    None
                }
            };
            future::ready(message)
        });

        Ok(stream.boxed())
    }
}
