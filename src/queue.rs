//! Main [`Queue`] implementation.
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::prelude::*;
use crate::transport::{
    AmqpTransport, Deliveries, Transport, TransportChannel, TransportConnection,
};
use crate::{message, Configuration, DeclaredQueue, Error, Message};

/// Channel type of a [`Transport`].
type ChannelOf<T> = <<T as Transport>::Connection as TransportConnection>::Channel;

/// A single queue on an AMQP broker, described by a [`Configuration`].
///
/// Construction connects, opens a channel and declares the queue. The queue
/// holds at most one connection and one channel at a time. Use
/// [`Queue::recover`] to bring it back after a fault and [`Queue::close`] to
/// release it. A queue dropped while still connected closes its connection in
/// the background.
///
/// ```rust,ignore
/// let mut queue = Queue::new(Configuration::new(uri, "jobs").durable(true)).await?;
/// queue.publish(b"hello", false, false).await?;
/// queue.process_incoming_messages("worker-1", |msg| println!("{:?}", msg.body()))
///     .await?;
/// queue.completion().await?;
/// ```
pub struct Queue<T = AmqpTransport>
where
    T: Transport,
{
    /// Dials the broker.
    transport: T,
    /// Shared with the caller.
    config: Arc<Configuration>,
    /// Current connection.
    connection: Option<T::Connection>,
    /// Current channel, opened on `connection`.
    channel: Option<ChannelOf<T>>,
    /// Result of the last declaration.
    declared: Option<DeclaredQueue>,
    /// Whether the last connection attempt succeeded.
    connected: bool,
    /// Consumer tasks started by [`Queue::process_incoming_messages`].
    consumers: JoinSet<Result<(), Error>>,
}

impl Queue<AmqpTransport> {
    /// Connects to the configured broker with [`lapin`] and declares the queue.
    ///
    /// # Errors
    ///
    /// This function may return an error due to one of the following reasons:
    ///
    /// - A connection to the broker can not be established
    /// - A channel can not be opened
    /// - The queue can not be declared
    pub async fn new(config: impl Into<Arc<Configuration>>) -> Result<Self, Error> {
        Self::with_transport(AmqpTransport::default(), config).await
    }
}

impl<T> Queue<T>
where
    T: Transport,
{
    /// Same as [`Queue::new`] over any [`Transport`].
    ///
    /// # Errors
    ///
    /// See [`Queue::new`].
    pub async fn with_transport(
        transport: T,
        config: impl Into<Arc<Configuration>>,
    ) -> Result<Self, Error> {
        /// Prefix errors regarding the setup.
        const ERR_TRACE_PREFIX: &str = "setting up queue failed";

        let mut queue = Self {
            transport,
            config: config.into(),
            connection: None,
            channel: None,
            declared: None,
            connected: false,
            consumers: JoinSet::new(),
        };
        queue
            .connect()
            .await
            .on_err(|err| error!("{ERR_TRACE_PREFIX}: {err}"))?;
        queue
            .open_channel()
            .await
            .on_err(|err| error!("{ERR_TRACE_PREFIX}: {err}"))?;
        queue
            .declare()
            .await
            .on_err(|err| error!("{ERR_TRACE_PREFIX}: {err}"))?;
        Ok(queue)
    }

    /// The configuration this queue was created with.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Whether a connection has been established and the queue not closed since.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The broker's answer to the last declaration.
    #[must_use]
    pub fn declared_queue(&self) -> Option<&DeclaredQueue> {
        self.declared.as_ref()
    }

    /// Publishes `body` on the configured exchange with the configured routing key
    /// and content type. Publisher confirms are not awaited.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] when no channel is open, otherwise the client's error.
    pub async fn publish(
        &self,
        body: &[u8],
        mandatory: bool,
        immediate: bool,
    ) -> Result<(), Error> {
        let channel = self.channel.as_ref().ok_or(Error::NotInitialized)?;
        channel
            .basic_publish(
                self.config.exchange_name(),
                self.config.routing_key(),
                Configuration::publish_options(mandatory, immediate),
                body,
                self.config.publish_properties(),
            )
            .await
            .on_err(|err| error!("publishing message failed: {err}"))?;
        debug!(bytes = body.len(), "message published");
        Ok(())
    }

    /// Publishes `payload` encoded as JSON, see [`Queue::publish`].
    ///
    /// # Errors
    ///
    /// See [`Queue::publish`], or [`Error::Serialize`].
    pub async fn publish_json<P>(
        &self,
        payload: &P,
        mandatory: bool,
        immediate: bool,
    ) -> Result<(), Error>
    where
        P: Serialize + ?Sized,
    {
        let body = message::Payload(payload).serialize()?;
        self.publish(&body, mandatory, immediate).await
    }

    /// Registers the consumer `consumer_id` on the queue and returns its feed.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] when no channel is open, otherwise the client's error.
    pub async fn get_consumer(&self, consumer_id: &str) -> Result<Deliveries, Error> {
        let channel = self.channel.as_ref().ok_or(Error::NotInitialized)?;
        let deliveries = channel
            .basic_consume(
                self.config.routing_key(),
                consumer_id,
                self.config.consume_options(),
                self.config.arguments().clone(),
            )
            .await?;
        Ok(deliveries)
    }

    /// Registers the consumer `consumer_id` and spawns a task calling `callback`
    /// for every delivery, in order, until the feed ends. Wait for the task with
    /// [`Queue::completion`].
    ///
    /// # Errors
    ///
    /// See [`Queue::get_consumer`].
    pub async fn process_incoming_messages<F>(
        &mut self,
        consumer_id: &str,
        callback: F,
    ) -> Result<(), Error>
    where
        F: FnMut(Message) + Send + 'static,
    {
        let deliveries = self.get_consumer(consumer_id).await?;
        let span = info_span!(
            "consumer",
            queue_name = %self.config.routing_key(),
            consumer_tag = %consumer_id,
        );
        self.consumers
            .spawn(consumer_task(deliveries, callback).instrument(span));
        Ok(())
    }

    /// Waits for every consumer task started so far to finish.
    ///
    /// # Errors
    ///
    /// The first error a consumer task ended with, or [`Error::ConsumerTask`] if a
    /// callback panicked. Tasks not yet joined can be awaited by calling this again.
    pub async fn completion(&mut self) -> Result<(), Error> {
        /// Prefix for errors of consumer tasks.
        const ERR_TRACE_PREFIX: &str = "a consumer task failed";

        while let Some(join_result) = self.consumers.join_next().await {
            let task_result = join_result.on_err(|err| error!("{ERR_TRACE_PREFIX}: {err}"))?;
            task_result?;
        }
        Ok(())
    }

    /// Reconnects if the connection is closed, then reopens the channel and
    /// redeclares the queue.
    ///
    /// # Errors
    ///
    /// The first error of reconnecting, opening the channel or declaring the queue.
    pub async fn recover(&mut self) -> Result<(), Error> {
        let closed = self.connection.as_ref().map_or(true, |conn| conn.is_closed());
        if closed {
            warn!("connection was closed");
            self.connected = false;
            self.connect()
                .await
                .on_err(|err| error!("error establishing connection: {err}"))?;
        }

        if let Some(channel) = self.channel.take() {
            if let Err(err) = channel.close().await {
                warn!("closing previous channel failed: {err}");
            }
        }
        self.open_channel()
            .await
            .on_err(|err| error!("error reopening channel: {err}"))?;

        self.declare()
            .await
            .on_err(|err| error!("error declaring queue: {err}"))?;
        Ok(())
    }

    /// Closes the channel, then the connection. Consumer feeds end with them.
    /// The queue can be reopened with [`Queue::recover`].
    ///
    /// # Errors
    ///
    /// The first error of closing the channel or the connection.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.connected = false;
        self.declared = None;

        let channel_result = match self.channel.take() {
            Some(channel) => channel.close().await,
            None => Ok(()),
        };
        let connection_result = match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        };
        channel_result
            .and(connection_result)
            .on_err(|err| error!("closing queue failed: {err}"))?;

        info!("queue closed");
        Ok(())
    }

    /// Dials the broker, replacing the current connection.
    async fn connect(&mut self) -> Result<(), Error> {
        let connection = self
            .transport
            .dial(self.config.host(), self.config.get_app_id())
            .await?;
        self.connection = Some(connection);
        self.connected = true;
        info!("connected to {}", self.config.redacted_host());
        Ok(())
    }

    /// Opens a channel on the current connection.
    async fn open_channel(&mut self) -> Result<(), Error> {
        let connection = self
            .connection
            .as_ref()
            .filter(|conn| !conn.is_closed())
            .ok_or(Error::NotConnected)?;
        self.channel = Some(connection.create_channel().await?);
        Ok(())
    }

    /// Declares the configured queue on the current channel.
    async fn declare(&mut self) -> Result<(), Error> {
        let channel = self.channel.as_ref().ok_or(Error::NotInitialized)?;
        let declared = channel
            .queue_declare(
                self.config.routing_key(),
                self.config.declare_options(),
                self.config.arguments().clone(),
            )
            .await?;
        debug!(
            queue_name = %declared.name,
            message_count = declared.message_count,
            consumer_count = declared.consumer_count,
            "queue declared",
        );
        self.declared = Some(declared);
        Ok(())
    }
}

/// Hands every delivery of `deliveries` to `callback` until the feed ends.
async fn consumer_task<F>(mut deliveries: Deliveries, mut callback: F) -> Result<(), Error>
where
    F: FnMut(Message) + Send + 'static,
{
    info!("consumer started");
    while let Some(delivery_result) = deliveries.next().await {
        let delivery = delivery_result.on_err(|err| error!("consumer failed: {err}"))?;
        debug!(delivery_tag = delivery.delivery_tag, "received delivery");
        callback(Message::from(delivery));
    }
    info!("consumer stopped");
    Ok(())
}

impl<T> Drop for Queue<T>
where
    T: Transport,
{
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        if connection.is_closed() {
            return;
        }
        let channel = self.channel.take();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("queue dropped outside of a tokio runtime, leaving the connection open");
            return;
        };
        handle.spawn(async move {
            if let Some(channel) = channel {
                if let Err(err) = channel.close().await {
                    warn!("closing channel of dropped queue failed: {err}");
                }
            }
            if let Err(err) = connection.close().await {
                warn!("closing connection of dropped queue failed: {err}");
            }
        });
    }
}

impl<T> fmt::Debug for Queue<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config)
            .field("connected", &self.connected)
            .field("declared", &self.declared)
            .field("consumers", &self.consumers.len())
            .finish_non_exhaustive()
    }
}
