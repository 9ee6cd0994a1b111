//! Crate wide [`Error`] type.
use crate::message::{DeserializeError, SerializeError};

/// Errors returned by [`crate::Queue`] operations.
///
/// Failures of the AMQP client are passed through unchanged as [`Error::Amqp`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Publishing or consuming without an open channel.
    #[error("queue has not been initialized")]
    NotInitialized,
    /// Opening a channel without a live connection.
    #[error("no connection to queue")]
    NotConnected,
    /// The AMQP client failed.
    #[error(transparent)]
    Amqp(#[from] lapin::Error),
    /// Encoding a payload failed.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    /// Decoding a payload failed.
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    /// A consumer task panicked or was aborted.
    #[error("joining consumer task failed: {0}")]
    ConsumerTask(#[from] tokio::task::JoinError),
}
