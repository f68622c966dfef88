//! WebSocket transport implementation.
//!
//! Splits an axum [`WebSocket`] into a [`QueuedHandle`] and a
//! [`WebSocketSource`]. A spawned writer task drains the outbound queue and
//! pings the peer on the heartbeat interval; the source fails with
//! [`TransportError::Timeout`] when nothing arrives within the heartbeat
//! timeout, which catches half-open connections.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::queue::{outbound_queue, Outbound, QueuedHandle};
use crate::traits::{MessageSource, TransportError};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Capacity of the per-connection outbound queue.
    pub outbound_queue: usize,
    /// How often to ping the peer.
    pub heartbeat_interval: Duration,
    /// How long the peer may stay silent before the connection is dropped.
    pub heartbeat_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

/// Split a WebSocket into a handle for the relay and a source for the session.
///
/// Must be called from within a tokio runtime; the writer task is spawned.
#[must_use]
pub fn split(socket: WebSocket, config: &WebSocketConfig) -> (QueuedHandle, WebSocketSource) {
    let (sink, stream) = socket.split();
    let (handle, rx) = outbound_queue(config.outbound_queue);

    tokio::spawn(write_loop(sink, rx, config.heartbeat_interval));

    let source = WebSocketSource {
        stream,
        idle_timeout: config.heartbeat_timeout,
    };
    (handle, source)
}

/// Drain the outbound queue into the socket, interleaving heartbeat pings.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    heartbeat_interval: Duration,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Message(data)) => {
                    let text = match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Dropping non UTF-8 outbound message");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!(error = %e, "WebSocket write failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            },

            _ = heartbeat.tick() => {
                trace!("Sending heartbeat ping");
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    debug!(error = %e, "Heartbeat ping failed");
                    break;
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        trace!(error = %e, "WebSocket close failed");
    }
}

/// The receiving half of a WebSocket connection.
pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
    idle_timeout: Duration,
}

#[async_trait]
impl MessageSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let next = tokio::time::timeout(self.idle_timeout, self.stream.next())
                .await
                .map_err(|_| TransportError::Timeout)?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    trace!(bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Any traffic counts as liveness.
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
