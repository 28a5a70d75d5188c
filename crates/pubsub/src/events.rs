//! # Event Shapes
//!
//! The bus itself treats events as opaque values. Transports that cross a
//! process boundary additionally need a topic and a wire payload, which is
//! what [`TopicEvent`] and [`EventShape`] describe.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BusError, BusResult};

/// Anything that can travel through the in-process bus.
///
/// Events are cloned once per subscriber, so cheap clones (small values or
/// `Arc`-wrapped payloads) are preferable.
pub trait Event: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Event for T {}

/// A concrete event shape that can be sent over a broker.
///
/// `TOPIC` is the routing key the shape is published under and the key its
/// decoder is registered with.
pub trait EventShape: Serialize + DeserializeOwned + Send + 'static {
    /// Topic name for this shape, e.g. `"market.order_created"`.
    const TOPIC: &'static str;
}

/// An event value that knows its own topic and wire encoding.
///
/// Typically implemented by an application enum with one variant per
/// [`EventShape`]:
///
/// ```rust,ignore
/// impl TopicEvent for MarketEvent {
///     fn topic(&self) -> &str {
///         match self {
///             Self::OrderCreated(_) => OrderCreated::TOPIC,
///             Self::LeaseClosed(_) => LeaseClosed::TOPIC,
///         }
///     }
///
///     fn encode(&self) -> BusResult<Vec<u8>> {
///         match self {
///             Self::OrderCreated(ev) => encode_shape(ev),
///             Self::LeaseClosed(ev) => encode_shape(ev),
///         }
///     }
/// }
/// ```
pub trait TopicEvent: Event {
    /// Topic this value is published under.
    fn topic(&self) -> &str;

    /// Serialize the payload (without the topic).
    ///
    /// # Errors
    ///
    /// Returns `BusError::Encode` if the payload cannot be serialized.
    fn encode(&self) -> BusResult<Vec<u8>>;
}

/// Serialize one shape as JSON.
///
/// # Errors
///
/// Returns `BusError::Encode` tagged with the shape's topic.
pub fn encode_shape<T: EventShape>(shape: &T) -> BusResult<Vec<u8>> {
    serde_json::to_vec(shape).map_err(|e| BusError::Encode {
        topic: T::TOPIC.to_string(),
        reason: e.to_string(),
    })
}

/// Reconstruct one shape from JSON.
///
/// # Errors
///
/// Returns `BusError::Decode` tagged with the shape's topic.
pub fn decode_shape<T: EventShape>(payload: &[u8]) -> BusResult<T> {
    serde_json::from_slice(payload).map_err(|e| BusError::Decode {
        topic: T::TOPIC.to_string(),
        reason: e.to_string(),
    })
}
