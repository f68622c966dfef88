//! Transport abstraction traits for roomcast.
//!
//! These traits define what the relay core needs from a live client
//! connection, so sessions can run over WebSockets or in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The outbound queue is full.
    #[error("Outbound queue full")]
    Backpressure,

    /// No inbound traffic within the heartbeat timeout.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// The sending half of a client connection.
///
/// `send` must not wait for the peer: implementations enqueue the message
/// and report immediately whether that was possible.
pub trait ConnectionHandle: Send + Sync {
    /// Queue an encoded message for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is gone or cannot accept more data.
    fn send(&self, message: Bytes) -> Result<(), TransportError>;

    /// Ask the connection to close. Calling this more than once is harmless.
    fn close(&self);

    /// Check if the connection still accepts messages.
    fn is_open(&self) -> bool {
        true
    }
}

/// The receiving half of a client connection.
#[async_trait]
pub trait MessageSource: Send {
    /// Receive the next text message.
    ///
    /// Returns `None` if the connection closed cleanly.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}
