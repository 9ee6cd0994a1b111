//! [`Message`] and message [`Payload`] definitions.
use std::ops::{Deref, DerefMut};

use lapin::message::Delivery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message id.
pub type Id = Uuid;

/// A single delivery handed to a consumer callback. Dereferences to the
/// underlying [`Delivery`], acknowledge it through its `acker` when the
/// queue is not configured with `auto_ack`.
#[derive(Debug)]
pub struct Message(Delivery);

impl Message {
    /// Body of the message.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.0.data
    }

    /// Decodes the body as a JSON [`Payload`].
    ///
    /// # Errors
    ///
    /// See [`DeserializeError`].
    pub fn payload<'de, T>(&'de self) -> Result<Payload<T>, DeserializeError>
    where
        T: Deserialize<'de>,
    {
        Payload::deserialize(&self.0.data)
    }

    /// Take back the underlying [`Delivery`].
    #[must_use]
    pub fn into_delivery(self) -> Delivery {
        self.0
    }
}

impl From<Delivery> for Message {
    fn from(delivery: Delivery) -> Self {
        Self(delivery)
    }
}

impl Deref for Message {
    type Target = Delivery;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Message payload.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<'de, T> Payload<T>
where
    T: Deserialize<'de>,
{
    /// Deserializes a message payload of type `T` from the given bytes.
    ///
    /// # Errors
    ///
    /// Possible errors originate from `serde_json`.
    pub fn deserialize(bytes: &'de [u8]) -> Result<Self, DeserializeError> {
        let inner = serde_json::from_slice(bytes).map_err(|err| DeserializeError(err.into()))?;
        Ok(Self(inner))
    }
}

/// When deserializing message payload fails.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DeserializeError(#[from] anyhow::Error);

impl<T> Payload<T>
where
    T: Serialize,
{
    /// Serializes the message payload to a vector of bytes.
    ///
    /// # Errors
    ///
    /// Possible errors originate from `serde_json`.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        serde_json::to_vec(&self.0).map_err(|err| SerializeError(err.into()))
    }
}

/// When serializing message payload fails.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SerializeError(#[from] anyhow::Error);

impl<T> Deref for Payload<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Payload<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
