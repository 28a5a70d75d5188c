//! # Type Registry
//!
//! Maps a topic name to the decoder that rebuilds a native event from an
//! untyped payload. Each broker-backed bus owns its own registry; there is
//! no process-wide table.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{BusError, BusResult};
use crate::events::{decode_shape, EventShape};

type Decoder<E> = Box<dyn Fn(&[u8]) -> BusResult<E> + Send + Sync>;

/// Topic-to-decoder table for events of type `E`.
pub struct TypeRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E> TypeRegistry<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register shape `T` under `T::TOPIC`; decoded values are converted
    /// into `E` with `From`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::AlreadyRegistered` if the topic is taken.
    pub fn register<T>(&mut self) -> BusResult<()>
    where
        T: EventShape + Into<E>,
    {
        self.register_decoder(T::TOPIC, |payload| decode_shape::<T>(payload).map(Into::into))
    }

    /// Register an explicit decoder for `topic`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::AlreadyRegistered` if the topic is taken.
    pub fn register_decoder<F>(&mut self, topic: impl Into<String>, decoder: F) -> BusResult<()>
    where
        F: Fn(&[u8]) -> BusResult<E> + Send + Sync + 'static,
    {
        let topic = topic.into();
        if self.decoders.contains_key(&topic) {
            return Err(BusError::AlreadyRegistered { topic });
        }

        debug!(topic = %topic, "Event shape registered");
        self.decoders.insert(topic, Box::new(decoder));
        Ok(())
    }

    /// Rebuild an event received on `topic`.
    ///
    /// # Errors
    ///
    /// - `BusError::UnknownTopic` - Nothing is registered for `topic`
    /// - `BusError::Decode` - The payload does not fit the registered shape
    pub fn decode(&self, topic: &str, payload: &[u8]) -> BusResult<E> {
        let decoder = self
            .decoders
            .get(topic)
            .ok_or_else(|| BusError::UnknownTopic {
                topic: topic.to_string(),
            })?;
        decoder(payload)
    }

    /// Whether `topic` has a decoder.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.decoders.contains_key(topic)
    }

    /// Registered topics, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Number of registered topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether no topic is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<E> Default for TypeRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for TypeRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}
