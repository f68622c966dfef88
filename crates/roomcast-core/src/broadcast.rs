//! Best-effort fan-out to a room's clients.
//!
//! The broadcaster holds no state. It resolves who should receive a message
//! and hands the same encoded buffer to each recipient's handle. A failed
//! send to one client is logged and counted; it never stops delivery to the
//! others and never reaches the caller as an error.

use crate::room::{Room, SharedHandle};
use bytes::Bytes;
use roomcast_protocol::{codec, ServerMessage, Target};
use tracing::{debug, trace, warn};

/// Who a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients<'a> {
    /// Every client in the room.
    All,
    /// Every client except the sender.
    AllExcept(&'a str),
    /// A single client, if it is still in the room.
    Only(&'a str),
    /// No one. The message was addressed to something that is not a client.
    Nobody,
}

impl<'a> Recipients<'a> {
    /// Resolve the delivery set for a message relayed from `sender`.
    #[must_use]
    pub fn resolve(sender: &'a str, target: Target<'a>) -> Self {
        match target {
            Target::Peers => Recipients::AllExcept(sender),
            Target::Client(id) => Recipients::Only(id),
            Target::Unaddressable => Recipients::Nobody,
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sends that were accepted by the recipient's handle.
    pub delivered: usize,
    /// Sends that failed and were dropped.
    pub failed: usize,
}

impl DeliveryReport {
    /// Add another report to this one.
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Stateless relay logic over a room's client set.
#[derive(Debug, Default, Clone, Copy)]
pub struct Broadcaster;

impl Broadcaster {
    /// Deliver an encoded message.
    pub fn deliver(room: &Room, recipients: Recipients<'_>, message: &Bytes) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        match recipients {
            Recipients::Only(target) => match room.handle(target) {
                Some(handle) => Self::send_one(room, target, handle, message, &mut report),
                None => trace!(room = %room.id(), target = %target, "Target not in room"),
            },
            Recipients::Nobody => trace!(room = %room.id(), "Message not addressed to a client"),
            Recipients::All | Recipients::AllExcept(_) => {
                let skip = match recipients {
                    Recipients::AllExcept(sender) => Some(sender),
                    _ => None,
                };
                for (client_id, handle) in room.clients() {
                    if Some(client_id.as_str()) == skip {
                        continue;
                    }
                    Self::send_one(room, client_id.as_str(), handle, message, &mut report);
                }
            }
        }

        trace!(
            room = %room.id(),
            delivered = report.delivered,
            failed = report.failed,
            "Delivered message"
        );
        report
    }

    /// Encode and deliver a server-originated message.
    pub fn notify(
        room: &Room,
        recipients: Recipients<'_>,
        message: &ServerMessage,
    ) -> DeliveryReport {
        match codec::encode(message) {
            Ok(data) => Self::deliver(room, recipients, &data),
            Err(e) => {
                warn!(room = %room.id(), kind = message.kind(), error = %e, "Failed to encode");
                DeliveryReport::default()
            }
        }
    }

    fn send_one(
        room: &Room,
        client_id: &str,
        handle: &SharedHandle,
        message: &Bytes,
        report: &mut DeliveryReport,
    ) {
        // Dead or slow peers are expected: their session notices on its own
        // and leaves the room.
        if !handle.is_open() {
            trace!(room = %room.id(), client = %client_id, "Skipping closed connection");
            report.failed += 1;
            return;
        }

        match handle.send(message.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                debug!(room = %room.id(), client = %client_id, error = %e, "Dropped message for client");
                report.failed += 1;
            }
        }
    }
}
