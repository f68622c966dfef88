//! Per-connection session lifecycle.
//!
//! A session moves through `Connecting -> Joined -> Closing -> Closed`.
//! Once joined, the client holds a [`Membership`] whose drop performs the
//! leave, so cleanup runs exactly once however the session ends: a clean
//! close, a malformed message, a transport error, or the session future
//! being dropped.

use crate::broadcast::DeliveryReport;
use crate::id::{ClientId, RoomId};
use crate::registry::{LeaveOutcome, RelayError, RoomRegistry};
use crate::room::SharedHandle;
use roomcast_protocol::{codec, ClientMessage};
use roomcast_transport::{MessageSource, TransportError};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet in the room.
    Connecting,
    /// In the room, processing messages.
    Joined,
    /// Leaving the room.
    Closing,
    /// Done.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the connection.
    ClientClosed,
    /// The client sent a message that could not be parsed.
    Malformed,
    /// Nothing arrived within the heartbeat timeout.
    Timeout,
    /// The transport failed.
    TransportError,
}

/// Counters for a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// The room the session was in.
    pub room_id: RoomId,
    /// The id the client was assigned.
    pub client_id: ClientId,
    /// Inbound messages processed.
    pub messages: u64,
    /// Outbound deliveries triggered by this session.
    pub deliveries: DeliveryReport,
    /// Why the session ended.
    pub reason: CloseReason,
}

/// Holds a client's place in a room and gives it up on drop.
struct Membership {
    registry: Arc<RoomRegistry>,
    room_id: RoomId,
    client_id: ClientId,
    handle: SharedHandle,
}

impl Drop for Membership {
    fn drop(&mut self) {
        match self
            .registry
            .leave(self.room_id.as_str(), self.client_id.as_str())
        {
            LeaveOutcome::Deleted => {
                debug!(room = %self.room_id, client = %self.client_id, "Last client left, room deleted");
            }
            LeaveOutcome::Remaining { clients, report } => {
                debug!(
                    room = %self.room_id,
                    client = %self.client_id,
                    remaining = clients,
                    notified = report.delivered,
                    "Client left"
                );
            }
            LeaveOutcome::NotJoined => {
                warn!(room = %self.room_id, client = %self.client_id, "Leave for unknown membership");
            }
        }
        self.handle.close();
    }
}

/// Drives one client connection through its room lifecycle.
pub struct SessionController {
    registry: Arc<RoomRegistry>,
    room_id: RoomId,
    state: SessionState,
}

impl SessionController {
    /// Create a session for a room.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>, room_id: impl Into<RoomId>) -> Self {
        Self {
            registry,
            room_id: room_id.into(),
            state: SessionState::Connecting,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the room id.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Join the room and process inbound messages until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the room cannot be joined. The handle is closed
    /// in that case. Once joined, the session always ends with `Ok`.
    pub async fn run<S>(
        &mut self,
        handle: SharedHandle,
        mut source: S,
    ) -> Result<SessionSummary, RelayError>
    where
        S: MessageSource,
    {
        let joined = match self.registry.join(self.room_id.as_str(), Arc::clone(&handle)) {
            Ok(joined) => joined,
            Err(e) => {
                debug!(room = %self.room_id, error = %e, "Join refused");
                handle.close();
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let membership = Membership {
            registry: Arc::clone(&self.registry),
            room_id: self.room_id.clone(),
            client_id: joined.snapshot.client_id,
            handle,
        };
        self.state = SessionState::Joined;

        let mut messages = 0u64;
        let mut deliveries = joined.report;

        let reason = loop {
            let text = match source.recv().await {
                Ok(Some(text)) => text,
                Ok(None) => break CloseReason::ClientClosed,
                Err(TransportError::Timeout) => {
                    debug!(room = %self.room_id, client = %membership.client_id, "Heartbeat timeout");
                    break CloseReason::Timeout;
                }
                Err(e) => {
                    debug!(room = %self.room_id, client = %membership.client_id, error = %e, "Transport error");
                    break CloseReason::TransportError;
                }
            };

            messages += 1;
            match self.dispatch(membership.client_id.as_str(), &text) {
                Ok(report) => deliveries.merge(report),
                Err(RelayError::Malformed(e)) => {
                    warn!(room = %self.room_id, client = %membership.client_id, error = %e, "Malformed message, closing");
                    break CloseReason::Malformed;
                }
                Err(e) => {
                    warn!(room = %self.room_id, client = %membership.client_id, error = %e, "Dispatch failed, closing");
                    break CloseReason::TransportError;
                }
            }
        };

        self.state = SessionState::Closing;
        let summary = SessionSummary {
            room_id: self.room_id.clone(),
            client_id: membership.client_id.clone(),
            messages,
            deliveries,
            reason,
        };
        drop(membership);
        self.state = SessionState::Closed;

        Ok(summary)
    }

    /// Handle one inbound message.
    fn dispatch(&self, client_id: &str, text: &str) -> Result<DeliveryReport, RelayError> {
        match codec::decode(text)? {
            ClientMessage::SetTopic(topic) => {
                trace!(room = %self.room_id, client = %client_id, "setTopic");
                self.registry.set_topic(self.room_id.as_str(), topic)
            }
            ClientMessage::Relay(message) => {
                self.registry
                    .relay(self.room_id.as_str(), client_id, message)
            }
        }
    }
}
