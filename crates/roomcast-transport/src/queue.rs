//! Bounded outbound queue used as a [`ConnectionHandle`].
//!
//! The relay pushes into the queue with `try_send`; a writer owned by the
//! transport drains it. A full queue means the peer is too slow and the
//! message is dropped for that peer only.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::traits::{ConnectionHandle, TransportError};

/// An item for the connection writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded message.
    Message(Bytes),
    /// Close the connection after everything queued before it.
    Close,
}

/// A [`ConnectionHandle`] backed by a bounded channel.
#[derive(Debug, Clone)]
pub struct QueuedHandle {
    tx: mpsc::Sender<Outbound>,
}

/// Create a handle and the receiver its writer drains.
#[must_use]
pub fn outbound_queue(capacity: usize) -> (QueuedHandle, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueuedHandle { tx }, rx)
}

impl ConnectionHandle for QueuedHandle {
    fn send(&self, message: Bytes) -> Result<(), TransportError> {
        self.tx
            .try_send(Outbound::Message(message))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
            })
    }

    fn close(&self) {
        // A full queue still gets closed: the writer stops once the receiver
        // side sees every sender dropped.
        if self.tx.try_send(Outbound::Close).is_err() {
            trace!("Close request not queued");
        }
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
