//! Amqp helper, configure a queue once and publish to or consume from it with a few calls.
#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(
    missing_docs,
    clippy::missing_docs_in_private_items,
    clippy::pedantic,
    clippy::unwrap_used
)]

mod builder_arguments;
pub mod configuration;
pub mod declared_queue;
pub mod error;
pub mod message;
pub mod queue;
pub mod transport;
pub use builder_arguments::BuilderArgs;
pub use configuration::Configuration;
pub use declared_queue::DeclaredQueue;
pub use error::Error;
pub use lapin;
pub use message::Message;
pub use queue::Queue;
pub use transport::{AmqpTransport, Deliveries, Transport, TransportChannel, TransportConnection};

pub mod util;

/// Prelude
pub mod prelude {
    pub use crate::BuilderArgs as _;
    pub use crate::util::OnError as _;
}
