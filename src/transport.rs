//! Seam between [`crate::Queue`] and the AMQP client.
//!
//! [`AmqpTransport`] forwards every call to [`lapin`]. Errors are returned as
//! they come out of the client.
use std::fmt;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ConnectionProperties};
use tracing::debug;

use crate::DeclaredQueue;

/// Feed of deliveries for a single consumer. Ends when the consumer is canceled
/// or its channel goes away.
pub type Deliveries = BoxStream<'static, Result<Delivery, lapin::Error>>;

/// Reply code sent when closing channels and connections.
const REPLY_SUCCESS: u16 = 200;

/// Establishes connections to a broker.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection type produced by [`Transport::dial`].
    type Connection: TransportConnection;

    /// Connect to the broker at `uri`. `app_id` names the connection.
    async fn dial(&self, uri: &str, app_id: Option<&str>)
        -> Result<Self::Connection, lapin::Error>;
}

/// A live connection to a broker.
#[async_trait]
pub trait TransportConnection: Send + Sync + 'static {
    /// Channel type produced by [`TransportConnection::create_channel`].
    type Channel: TransportChannel;

    /// Whether the connection can no longer be used.
    fn is_closed(&self) -> bool;

    /// Open a new channel.
    async fn create_channel(&self) -> Result<Self::Channel, lapin::Error>;

    /// Close the connection. Closing a closed connection succeeds.
    async fn close(&self) -> Result<(), lapin::Error>;
}

/// A channel on a [`TransportConnection`].
#[async_trait]
pub trait TransportChannel: Send + Sync + 'static {
    /// Declare the queue `name`.
    async fn queue_declare(
        &self,
        name: &str,
        opts: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<DeclaredQueue, lapin::Error>;

    /// Publish `payload` without waiting for a confirmation.
    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        opts: BasicPublishOptions,
        payload: &[u8],
        props: BasicProperties,
    ) -> Result<(), lapin::Error>;

    /// Register the consumer `consumer_tag` on `queue`.
    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        opts: BasicConsumeOptions,
        args: FieldTable,
    ) -> Result<Deliveries, lapin::Error>;

    /// Close the channel. Closing a closed channel succeeds.
    async fn close(&self) -> Result<(), lapin::Error>;
}

/// [`Transport`] backed by [`lapin`].
#[derive(Clone, Default)]
pub struct AmqpTransport {
    /// Properties every connection is created with.
    props: ConnectionProperties,
}

impl AmqpTransport {
    /// Use custom [`ConnectionProperties`], e.g. to pick an executor.
    #[must_use]
    pub fn new(props: ConnectionProperties) -> Self {
        Self { props }
    }
}

impl fmt::Debug for AmqpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    type Connection = lapin::Connection;

    async fn dial(
        &self,
        uri: &str,
        app_id: Option<&str>,
    ) -> Result<Self::Connection, lapin::Error> {
        let props = match app_id {
            Some(app_id) => self.props.clone().with_connection_name(app_id.into()),
            None => self.props.clone(),
        };
        lapin::Connection::connect(uri, props).await
    }
}

#[async_trait]
impl TransportConnection for lapin::Connection {
    type Channel = lapin::Channel;

    fn is_closed(&self) -> bool {
        !self.status().connected()
    }

    async fn create_channel(&self) -> Result<Self::Channel, lapin::Error> {
        lapin::Connection::create_channel(self).await
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        if !self.status().connected() {
            return Ok(());
        }
        debug!("closing connection");
        lapin::Connection::close(self, REPLY_SUCCESS, "OK").await
    }
}

#[async_trait]
impl TransportChannel for lapin::Channel {
    async fn queue_declare(
        &self,
        name: &str,
        opts: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<DeclaredQueue, lapin::Error> {
        lapin::Channel::queue_declare(self, name, opts, args)
            .await
            .map(DeclaredQueue::from)
    }

    async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        opts: BasicPublishOptions,
        payload: &[u8],
        props: BasicProperties,
    ) -> Result<(), lapin::Error> {
        lapin::Channel::basic_publish(self, exchange, routing_key, opts, payload, props)
            .await
            .map(|_confirm| ())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        opts: BasicConsumeOptions,
        args: FieldTable,
    ) -> Result<Deliveries, lapin::Error> {
        let consumer = lapin::Channel::basic_consume(self, queue, consumer_tag, opts, args).await?;
        Ok(consumer.boxed())
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        if !self.status().connected() {
            return Ok(());
        }
        debug!(channel_id = self.id(), "closing channel");
        lapin::Channel::close(self, REPLY_SUCCESS, "OK").await
    }
}
