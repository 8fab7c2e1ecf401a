use std::{
    pin::Pin,
    task,
};

use anyhow::{
    Error,
    Result,
};
use futures_util::{
    Sink,
    SinkExt,
    Stream,
    StreamExt,
};

use crate::{
    message::message::Message,
    serializer::serializer::Serializer,
    transport::transport::{
        Transport,
        TransportData,
    },
};

/// A frame read from a [`MessageStream`].
pub enum StreamMessage {
    /// A keepalive frame, to be echoed back.
    Ping(Vec<u8>),
    /// A decoded WAMP message.
    Message(Message),
    /// A frame that could not be decoded into a message.
    ///
    /// Malformed frames are reported rather than failing the stream: a single bad frame is not
    /// fatal to the connection.
    Malformed(Error),
}

/// A stream of WAMP messages over a transport, applying the connection's serializer in both
/// directions.
pub struct MessageStream {
    transport: Box<dyn Transport>,
    serializer: Box<dyn Serializer>,
}

impl MessageStream {
    pub fn new(transport: Box<dyn Transport>, serializer: Box<dyn Serializer>) -> Self {
        Self {
            transport,
            serializer,
        }
    }
}

impl Stream for MessageStream {
    type Item = Result<StreamMessage>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        match futures_util::ready!(self.transport.poll_next_unpin(cx)) {
            Some(Ok(TransportData::Ping(data))) => {
                task::Poll::Ready(Some(Ok(StreamMessage::Ping(data))))
            }
            Some(Ok(TransportData::Message(data))) => {
                let message = match self.serializer.deserialize(&data) {
                    Ok(message) => StreamMessage::Message(message),
                    Err(err) => StreamMessage::Malformed(err),
                };
                task::Poll::Ready(Some(Ok(message)))
            }
            Some(Err(err)) => task::Poll::Ready(Some(Err(err))),
            None => task::Poll::Ready(None),
        }
    }
}

impl Sink<Message> for MessageStream {
    type Error = Error;

    fn poll_ready(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        self.transport.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> std::result::Result<(), Self::Error> {
        let data = self.serializer.serialize(&item)?;
        self.transport.start_send_unpin(TransportData::Message(data))
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        self.transport.poll_flush_unpin(cx)
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        self.transport.poll_close_unpin(cx)
    }
}

impl MessageStream {
    /// Echoes a keepalive frame back to the transport.
    pub async fn pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.transport.send(TransportData::Ping(data)).await
    }
}
