//! # Redis Broker
//!
//! [`Broker`] backed by Redis PUBLISH / SUBSCRIBE. Exact topics use
//! `SUBSCRIBE`, wildcard topics use `PSUBSCRIBE`.
//!
//! Enabled with the `redis` cargo feature.

use std::env;

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, trace, warn};

use crate::broker::{Broker, BrokerMessage, BrokerStream};
use crate::error::{BusError, BusResult};
use crate::topic::TopicPattern;

/// Address used when `PUBSUB_REDIS_URL` is not set.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Redis address from `PUBSUB_REDIS_URL`, or [`DEFAULT_REDIS_URL`].
#[must_use]
pub fn redis_url_from_env() -> String {
    env::var("PUBSUB_REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string())
}

fn broker_error(err: redis::RedisError) -> BusError {
    BusError::Broker(err.to_string())
}

/// Redis glob matching every topic that starts with `prefix` literally.
fn prefix_glob(prefix: &str) -> String {
    let mut glob = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            glob.push('\\');
        }
        glob.push(c);
    }
    glob.push('*');
    glob
}

/// Redis-backed broker.
///
/// Publishing shares one multiplexed connection; every subscription opens
/// its own pub/sub connection, closed when the stream is dropped.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisBroker {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Broker` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = redis::Client::open(url).map_err(broker_error)?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(broker_error)?;

        debug!(url = url, "Connected to redis broker");
        Ok(Self { client, publisher })
    }

    /// Connect using `PUBSUB_REDIS_URL`.
    ///
    /// # Errors
    ///
    /// Same as [`RedisBroker::connect`].
    pub async fn from_env() -> BusResult<Self> {
        Self::connect(&redis_url_from_env()).await
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(topic, payload).await.map_err(broker_error)?;
        trace!(topic = topic, receivers = receivers, "Redis message published");
        Ok(())
    }

    async fn subscribe(&self, patterns: &[TopicPattern]) -> BusResult<BrokerStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(broker_error)?;

        let all = [TopicPattern::all()];
        let patterns = if patterns.is_empty() { &all[..] } else { patterns };

        for pattern in patterns {
            match pattern {
                TopicPattern::Exact(topic) => pubsub.subscribe(topic.as_str()).await,
                TopicPattern::Prefix(prefix) => pubsub.psubscribe(prefix_glob(prefix)).await,
            }
            .map_err(broker_error)?;
        }

        let stream = pubsub.into_on_message().filter_map(|msg| {
            let topic = msg.get_channel_name().to_string();
            let message = match msg.get_payload::<Vec<u8>>() {
                Ok(payload) => Some(BrokerMessage { topic, payload }),
                Err(err) => {
                    warn!(topic = %topic, error = %err, "Unreadable redis payload");
                    None
                }
            };
            future::ready(message)
        });

        Ok(stream.boxed())
    }
}
