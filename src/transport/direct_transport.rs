use std::{
    pin::Pin,
    task,
};

use anyhow::{
    Error,
    Result,
};
use tokio::sync::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
    unbounded_channel,
};

use crate::transport::transport::{
    Transport,
    TransportData,
};

/// An in-process transport over a pair of channels.
///
/// Useful for connecting a peer to an in-process counterpart and for driving a peer from tests
/// frame by frame. Dropping one end closes the other end's receive stream, which reads as a clean
/// connection shutdown.
#[derive(Debug)]
pub struct DirectTransport {
    tx: UnboundedSender<TransportData>,
    rx: UnboundedReceiver<TransportData>,
}

/// Creates a linked pair of [`DirectTransport`]s.
///
/// Frames sent on one end are received on the other.
pub fn direct_transport_pair() -> (DirectTransport, DirectTransport) {
    let (a_tx, a_rx) = unbounded_channel();
    let (b_tx, b_rx) = unbounded_channel();
    (
        DirectTransport { tx: a_tx, rx: b_rx },
        DirectTransport { tx: b_tx, rx: a_rx },
    )
}

impl Transport for DirectTransport {}

impl futures_util::Stream for DirectTransport {
    type Item = Result<TransportData>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|data| data.map(Ok))
    }
}

impl futures_util::Sink<TransportData> for DirectTransport {
    type Error = Error;

    fn poll_ready(
        self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn start_send(
        self: Pin<&mut Self>,
        item: TransportData,
    ) -> std::result::Result<(), Self::Error> {
        self.tx
            .send(item)
            .map_err(|_| Error::msg("direct transport closed"))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<std::result::Result<(), Self::Error>> {
        self.rx.close();
        task::Poll::Ready(Ok(()))
    }
}
