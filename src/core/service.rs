use std::time::Duration;

use anyhow::{
    Error,
    Result,
};
use futures_util::{
    SinkExt,
    StreamExt,
};
use log::{
    error,
    warn,
};
use tokio::sync::{
    broadcast,
    mpsc::{
        UnboundedReceiver,
        UnboundedSender,
        unbounded_channel,
    },
};

use crate::{
    core::stream::{
        MessageStream,
        StreamMessage,
    },
    message::message::Message,
    serializer::serializer::Serializer,
    transport::transport::Transport,
};

/// How long the connection may sit without any inbound traffic before it is torn down.
///
/// Keepalive pings count as traffic, so a healthy connection never trips this.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// The terminal report of a [`Service`].
#[derive(Debug, Default, Clone)]
pub struct ServiceEnd {
    /// A description of the failure that ended the service, if it did not end cleanly.
    pub error: Option<String>,
}

/// A handle to an asynchronously-running [`Service`].
pub struct ServiceHandle {
    cancel_tx: broadcast::Sender<()>,
    message_tx: UnboundedSender<Message>,
}

impl ServiceHandle {
    /// A sender that cancels the service, detached from the handle's lifetime.
    ///
    /// Cancellation is the correct way to cleanly exit a service.
    pub fn cancel_tx(&self) -> broadcast::Sender<()> {
        self.cancel_tx.clone()
    }

    /// The message transmission channel.
    pub fn message_tx(&self) -> UnboundedSender<Message> {
        self.message_tx.clone()
    }
}

/// The asynchronous service that sends and receives WAMP messages over an underlying transport.
///
/// The service provides a common layer for WAMP messaging: received frames are decoded and passed
/// to an inbound channel for the session layer to process, outbound messages are accepted over a
/// channel and written to the transport, keepalive pings are echoed, and malformed frames are
/// logged and dropped.
///
/// The service does not interpret messages. If the session layer wishes to close the connection,
/// it sends whatever closing messages the protocol calls for and then cancels the service.
pub struct Service {
    name: String,
    stream: MessageStream,
    inbound_tx: UnboundedSender<Message>,
    end_tx: broadcast::Sender<ServiceEnd>,
    _end_rx: broadcast::Receiver<ServiceEnd>,
    cancel_tx: broadcast::Sender<()>,
    cancel_rx: broadcast::Receiver<()>,

    outbound_tx: UnboundedSender<Message>,
    outbound_rx: UnboundedReceiver<Message>,
}

impl Service {
    /// Creates a new service over the given transport and serializer.
    ///
    /// Returns the service and the channel on which decoded inbound messages are delivered.
    pub fn new(
        name: String,
        transport: Box<dyn Transport>,
        serializer: Box<dyn Serializer>,
    ) -> (Self, UnboundedReceiver<Message>) {
        let stream = MessageStream::new(transport, serializer);
        let (inbound_tx, inbound_rx) = unbounded_channel();
        let (end_tx, end_rx) = broadcast::channel(1);
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        let (outbound_tx, outbound_rx) = unbounded_channel();
        (
            Self {
                name,
                stream,
                inbound_tx,
                end_tx,
                _end_rx: end_rx,
                cancel_tx,
                cancel_rx,
                outbound_tx,
                outbound_rx,
            },
            inbound_rx,
        )
    }

    /// The end receiver channel, signaled once when the service terminates.
    pub fn end_rx(&self) -> broadcast::Receiver<ServiceEnd> {
        self.end_tx.subscribe()
    }

    /// Starts the service asynchronously.
    ///
    /// This method takes ownership of the service. All future interactions with the service should
    /// be made through the returned handle.
    pub fn start(self) -> ServiceHandle {
        let cancel_tx = self.cancel_tx.clone();
        let message_tx = self.outbound_tx.clone();
        tokio::spawn(self.run());
        ServiceHandle {
            cancel_tx,
            message_tx,
        }
    }

    async fn run(mut self) {
        let error = match self.service_loop().await {
            Ok(()) => None,
            Err(err) => {
                error!("Service {} failed: {err:#}", self.name);
                Some(format!("{err:#}"))
            }
        };
        if let Err(err) = self.end(error).await {
            error!("Failed to end service {}: {err:#}", self.name);
        }
    }

    async fn service_loop(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                // Biased so that queued outbound messages are flushed before cancellation is
                // honored: the session cancels the service right after queueing its final
                // closing messages (ABORT, GOODBYE), and those must still reach the wire.
                biased;
                message = self.outbound_rx.recv() => {
                    match message {
                        Some(message) => {
                            self.stream.send(message).await?;
                        }
                        None => {
                            return Err(Error::msg("outbound message channel closed"));
                        }
                    }
                }
                message = self.stream.next() => {
                    match message {
                        Some(Ok(StreamMessage::Ping(data))) => {
                            // Ping the data back.
                            self.stream.pong(data).await?;
                        }
                        Some(Ok(StreamMessage::Message(message))) => {
                            // Send the message out for handling.
                            self.inbound_tx.send(message)?;
                        }
                        Some(Ok(StreamMessage::Malformed(err))) => {
                            // A single undecodable frame is dropped, not fatal.
                            warn!("Service {} dropped a malformed frame: {err:#}", self.name);
                        }
                        Some(Err(err)) => {
                            return Err(err);
                        }
                        None => {
                            return Ok(());
                        }
                    }
                }
                // Cancellation is the correct way to cleanly exit the service.
                _ = self.cancel_rx.recv() => {
                    return Ok(());
                }
                // Timeout is implemented at this layer so that ping frames are considered for
                // keeping the connection alive.
                _ = tokio::time::sleep(IDLE_TIMEOUT) => {
                    return Err(Error::msg("timed out"));
                }
            }
        }
    }

    async fn end(&mut self, error: Option<String>) -> Result<()> {
        // Ignore errors with the stream, since it may already be closed.
        self.stream.close().await.ok();
        self.end_tx.send(ServiceEnd { error })?;
        Ok(())
    }
}
