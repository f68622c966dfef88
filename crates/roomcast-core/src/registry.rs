//! Room registry for roomcast.
//!
//! The registry owns every room. Each room lives in one shard of a
//! [`DashMap`]; joins, leaves, topic changes and relays hold that shard's
//! lock for the whole mutation plus the fan-out that goes with it, so a
//! roster change and its notification are atomic with respect to other
//! operations on the same room. Handles only enqueue, so nothing blocks
//! while the lock is held.

use crate::broadcast::{Broadcaster, DeliveryReport, Recipients};
use crate::id::{ClientId, RoomId};
use crate::room::{JoinSnapshot, Room, SharedHandle};
use dashmap::DashMap;
use roomcast_protocol::{codec, ProtocolError, RelayMessage, ServerMessage};
use roomcast_transport::TransportError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Room not found.
    #[error("Room not found: {0}")]
    NotFound(String),

    /// The room has reached its client limit.
    #[error("Room {room} is full ({limit} clients)")]
    RoomFull {
        /// Room id.
        room: String,
        /// Configured limit.
        limit: usize,
    },

    /// The registry has reached its room limit.
    #[error("Maximum rooms reached ({0})")]
    RoomLimitReached(usize),

    /// Malformed inbound message.
    #[error("Malformed message: {0}")]
    Malformed(#[from] ProtocolError),

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of live rooms.
    pub max_rooms: usize,
    /// Maximum clients joined to one room.
    pub max_clients_per_room: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            max_clients_per_room: 256,
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct Joined {
    /// What the client saw when it joined.
    pub snapshot: JoinSnapshot,
    /// Delivery of the hello and clientJoin notifications.
    pub report: DeliveryReport,
}

/// Result of a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The client was the last one; the room is gone.
    Deleted,
    /// Other clients remain and were sent a clientPart.
    Remaining {
        /// Clients left in the room.
        clients: usize,
        /// Delivery of the clientPart notification.
        report: DeliveryReport,
    },
    /// The room or client did not exist.
    NotJoined,
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of joined clients across all rooms.
    pub client_count: usize,
}

/// The in-memory registry of rooms.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Room>,
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating room registry with config: {:?}", config);
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the number of live rooms without visiting them.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get registry statistics.
    ///
    /// Visits every room to count clients.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            client_count: self.rooms.iter().map(|r| r.client_count()).sum(),
        }
    }

    /// Create an empty room carrying `topic`.
    ///
    /// Ids carry 128 random bits, so no collision check is made.
    ///
    /// `max_rooms` is a soft cap: the count and the insert are separate shard
    /// operations, so concurrent creates may overshoot it by a few rooms.
    ///
    /// # Errors
    ///
    /// Returns an error if the room limit is reached.
    pub fn create(&self, topic: Value) -> Result<RoomId, RelayError> {
        if self.rooms.len() >= self.config.max_rooms {
            return Err(RelayError::RoomLimitReached(self.config.max_rooms));
        }

        let id = RoomId::generate();
        self.rooms.insert(id.clone(), Room::new(id.clone(), topic));
        debug!(room = %id, "Created room");

        Ok(id)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Get a room's topic.
    #[must_use]
    pub fn topic(&self, room_id: &str) -> Option<Value> {
        self.rooms.get(room_id).map(|room| room.topic().clone())
    }

    /// Get the number of clients in a room.
    #[must_use]
    pub fn client_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|room| room.client_count())
            .unwrap_or(0)
    }

    /// Get the ids of the clients in a room.
    #[must_use]
    pub fn client_ids(&self, room_id: &str) -> Vec<ClientId> {
        self.rooms
            .get(room_id)
            .map(|room| room.client_ids())
            .unwrap_or_default()
    }

    /// Check if a room has reached its client limit.
    #[must_use]
    pub fn is_full(&self, room_id: &str) -> bool {
        self.client_count(room_id) >= self.config.max_clients_per_room
    }

    /// Join a client to a room.
    ///
    /// The new client is sent `hello`, then everyone else is sent
    /// `clientJoin`, before any other operation on the room can run.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or is full.
    pub fn join(&self, room_id: &str, handle: SharedHandle) -> Result<Joined, RelayError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RelayError::NotFound(room_id.to_string()))?;

        if room.client_count() >= self.config.max_clients_per_room {
            return Err(RelayError::RoomFull {
                room: room_id.to_string(),
                limit: self.config.max_clients_per_room,
            });
        }

        let snapshot = room.join(handle);
        let client_id = snapshot.client_id.as_str();

        let hello = ServerMessage::hello(
            client_id,
            snapshot.topic.clone(),
            snapshot.clients.iter().map(|c| c.to_string()).collect(),
        );
        let mut report = Broadcaster::notify(&room, Recipients::Only(client_id), &hello);
        report.merge(Broadcaster::notify(
            &room,
            Recipients::AllExcept(client_id),
            &ServerMessage::client_join(client_id),
        ));

        Ok(Joined { snapshot, report })
    }

    /// Remove a client from a room.
    ///
    /// If it was the last client the room is deleted in the same critical
    /// section; otherwise the remaining clients are sent `clientPart`.
    pub fn leave(&self, room_id: &str, client_id: &str) -> LeaveOutcome {
        let mut outcome = LeaveOutcome::NotJoined;

        let removed = self.rooms.remove_if_mut(room_id, |_, room| {
            if room.leave(client_id).is_none() {
                return false;
            }
            if room.is_empty() {
                return true;
            }
            let report = Broadcaster::notify(
                room,
                Recipients::AllExcept(client_id),
                &ServerMessage::client_part(client_id),
            );
            outcome = LeaveOutcome::Remaining {
                clients: room.client_count(),
                report,
            };
            false
        });

        if removed.is_some() {
            debug!(room = %room_id, "Deleted empty room");
            outcome = LeaveOutcome::Deleted;
        }
        outcome
    }

    /// Replace a room's topic and tell every client, including the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist.
    pub fn set_topic(&self, room_id: &str, topic: Value) -> Result<DeliveryReport, RelayError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RelayError::NotFound(room_id.to_string()))?;

        let notification = ServerMessage::set_topic(topic.clone());
        room.set_topic(topic);
        debug!(room = %room_id, "Topic changed");

        Ok(Broadcaster::notify(&room, Recipients::All, &notification))
    }

    /// Relay an application message from `sender`.
    ///
    /// The message is stamped with the sender's id. With a `target` it goes
    /// to that client only, otherwise to everyone except the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or encoding fails.
    pub fn relay(
        &self,
        room_id: &str,
        sender: &str,
        mut message: RelayMessage,
    ) -> Result<DeliveryReport, RelayError> {
        message.stamp_sender(sender);
        let data = codec::encode_relay(&message)?;

        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RelayError::NotFound(room_id.to_string()))?;

        trace!(room = %room_id, client = %sender, kind = message.kind(), "Relaying message");
        let recipients = Recipients::resolve(sender, message.target());
        Ok(Broadcaster::deliver(&room, recipients, &data))
    }

    /// Delete rooms that nobody has joined for at least `max_age`.
    ///
    /// Returns the number of rooms removed.
    pub fn prune_unjoined(&self, max_age: Duration) -> usize {
        let stale: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|room| room.is_empty() && room.age() >= max_age)
            .map(|room| room.key().clone())
            .collect();

        let removed = stale
            .iter()
            .filter(|id| self.delete(id.as_str(), max_age))
            .count();

        if removed > 0 {
            debug!(rooms = removed, "Pruned unjoined rooms");
        }
        removed
    }

    /// Remove a room if it is still empty and old enough.
    ///
    /// Re-checked under the shard lock, so a join that won the race keeps
    /// the room alive.
    fn delete(&self, room_id: &str, max_age: Duration) -> bool {
        self.rooms
            .remove_if(room_id, |_, room| room.is_empty() && room.age() >= max_age)
            .is_some()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{drain, handle};
    use roomcast_protocol::{codec, ClientMessage};
    use serde_json::json;
    use std::collections::HashSet;

    fn relay_message(text: &str) -> RelayMessage {
        match codec::decode(text).unwrap() {
            ClientMessage::Relay(msg) => msg,
            other => panic!("expected relay message, got {:?}", other),
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let registry = RoomRegistry::new();
        let id = registry.create(json!("t1")).unwrap();

        assert!(registry.contains(id.as_str()));
        assert_eq!(registry.topic(id.as_str()), Some(json!("t1")));
        assert_eq!(registry.client_count(id.as_str()), 0);
        assert!(registry.topic("unknown").is_none());
    }

    #[test]
    fn test_create_many_distinct() {
        let registry = RoomRegistry::with_config(RegistryConfig {
            max_rooms: usize::MAX,
            ..Default::default()
        });
        let ids: HashSet<RoomId> = (0..5_000)
            .map(|_| registry.create(Value::Null).unwrap())
            .collect();
        assert_eq!(ids.len(), 5_000);
        assert_eq!(registry.stats().room_count, 5_000);
    }

    #[test]
    fn test_room_limit() {
        let registry = RoomRegistry::with_config(RegistryConfig {
            max_rooms: 1,
            ..Default::default()
        });
        registry.create(Value::Null).unwrap();
        assert!(matches!(
            registry.create(Value::Null),
            Err(RelayError::RoomLimitReached(1))
        ));
    }

    #[test]
    fn test_join_unknown_room() {
        let registry = RoomRegistry::new();
        let (h, _rx) = handle();
        assert!(matches!(
            registry.join("missing", h),
            Err(RelayError::NotFound(_))
        ));
    }

    #[test]
    fn test_join_sends_hello_and_client_join() {
        let registry = RoomRegistry::new();
        let room = registry.create(json!("t1")).unwrap();

        let (a, mut rx_a) = handle();
        let a_id = registry.join(room.as_str(), a).unwrap().snapshot.client_id;
        assert_eq!(
            drain(&mut rx_a),
            vec![json!({
                "type": "hello",
                "payload": {"clientid": a_id.as_str(), "topic": "t1", "clients": []}
            })]
        );

        let (b, mut rx_b) = handle();
        let joined = registry.join(room.as_str(), b).unwrap();
        let b_id = joined.snapshot.client_id;
        assert_eq!(joined.report, DeliveryReport { delivered: 2, failed: 0 });

        assert_eq!(
            drain(&mut rx_b),
            vec![json!({
                "type": "hello",
                "payload": {"clientid": b_id.as_str(), "topic": "t1", "clients": [a_id.as_str()]}
            })]
        );
        assert_eq!(
            drain(&mut rx_a),
            vec![json!({"type": "clientJoin", "payload": b_id.as_str()})]
        );
    }

    #[test]
    fn test_room_full() {
        let registry = RoomRegistry::with_config(RegistryConfig {
            max_clients_per_room: 1,
            ..Default::default()
        });
        let room = registry.create(Value::Null).unwrap();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();

        registry.join(room.as_str(), a).unwrap();
        assert!(registry.is_full(room.as_str()));
        assert!(matches!(
            registry.join(room.as_str(), b),
            Err(RelayError::RoomFull { limit: 1, .. })
        ));
    }

    #[test]
    fn test_last_leave_deletes_room() {
        let registry = RoomRegistry::new();
        let room = registry.create(Value::Null).unwrap();
        let (a, _rx) = handle();
        let a_id = registry.join(room.as_str(), a).unwrap().snapshot.client_id;

        assert_eq!(registry.leave(room.as_str(), a_id.as_str()), LeaveOutcome::Deleted);
        assert!(!registry.contains(room.as_str()));
        assert_eq!(registry.leave(room.as_str(), a_id.as_str()), LeaveOutcome::NotJoined);
    }

    #[test]
    fn test_leave_notifies_remaining() {
        let registry = RoomRegistry::new();
        let room = registry.create(Value::Null).unwrap();
        let (a, mut rx_a) = handle();
        let (b, _rx_b) = handle();
        registry.join(room.as_str(), a).unwrap();
        let b_id = registry.join(room.as_str(), b).unwrap().snapshot.client_id;
        drain(&mut rx_a);

        let outcome = registry.leave(room.as_str(), b_id.as_str());
        assert!(matches!(outcome, LeaveOutcome::Remaining { clients: 1, .. }));
        assert!(registry.contains(room.as_str()));
        assert_eq!(
            drain(&mut rx_a),
            vec![json!({"type": "clientPart", "payload": b_id.as_str()})]
        );
    }

    #[test]
    fn test_leave_unknown_client_keeps_room() {
        let registry = RoomRegistry::new();
        let room = registry.create(Value::Null).unwrap();

        assert_eq!(registry.leave(room.as_str(), "nobody"), LeaveOutcome::NotJoined);
        assert!(registry.contains(room.as_str()));
    }

    #[test]
    fn test_set_topic_reaches_everyone() {
        let registry = RoomRegistry::new();
        let room = registry.create(json!("t1")).unwrap();
        let (a, mut rx_a) = handle();
        let (b, mut rx_b) = handle();
        registry.join(room.as_str(), a).unwrap();
        registry.join(room.as_str(), b).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let report = registry.set_topic(room.as_str(), json!("t2")).unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(registry.topic(room.as_str()), Some(json!("t2")));

        let expected = vec![json!({"type": "setTopic", "payload": "t2"})];
        assert_eq!(drain(&mut rx_a), expected);
        assert_eq!(drain(&mut rx_b), expected);
    }

    #[test]
    fn test_relay_broadcast_and_directed() {
        let registry = RoomRegistry::new();
        let room = registry.create(Value::Null).unwrap();
        let (a, mut rx_a) = handle();
        let (b, mut rx_b) = handle();
        let (c, mut rx_c) = handle();
        let a_id = registry.join(room.as_str(), a).unwrap().snapshot.client_id;
        let b_id = registry.join(room.as_str(), b).unwrap().snapshot.client_id;
        registry.join(room.as_str(), c).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        registry
            .relay(room.as_str(), a_id.as_str(), relay_message(r#"{"type":"ping"}"#))
            .unwrap();
        let expected = vec![json!({"type": "ping", "clientid": a_id.as_str()})];
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), expected);
        assert_eq!(drain(&mut rx_c), expected);

        let directed = format!(r#"{{"type":"ping","target":"{}"}}"#, b_id);
        registry
            .relay(room.as_str(), a_id.as_str(), relay_message(&directed))
            .unwrap();
        assert_eq!(
            drain(&mut rx_b),
            vec![json!({"type": "ping", "target": b_id.as_str(), "clientid": a_id.as_str()})]
        );
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_c).is_empty());

        let report = registry
            .relay(room.as_str(), a_id.as_str(), relay_message(r#"{"type":"ping","target":7}"#))
            .unwrap();
        assert_eq!(report, DeliveryReport::default());
        assert!(drain(&mut rx_b).is_empty());
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_prune_unjoined() {
        let registry = RoomRegistry::new();
        let idle = registry.create(Value::Null).unwrap();
        let busy = registry.create(Value::Null).unwrap();
        let (a, _rx) = handle();
        registry.join(busy.as_str(), a).unwrap();

        assert_eq!(registry.prune_unjoined(Duration::from_secs(3600)), 0);
        assert_eq!(registry.prune_unjoined(Duration::ZERO), 1);
        assert!(!registry.contains(idle.as_str()));
        assert!(registry.contains(busy.as_str()));
    }

    #[test]
    fn test_stats() {
        let registry = RoomRegistry::new();
        let r1 = registry.create(Value::Null).unwrap();
        let r2 = registry.create(Value::Null).unwrap();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        let (c, _rx_c) = handle();
        registry.join(r1.as_str(), a).unwrap();
        registry.join(r1.as_str(), b).unwrap();
        registry.join(r2.as_str(), c).unwrap();

        assert_eq!(
            registry.stats(),
            RegistryStats {
                room_count: 2,
                client_count: 3
            }
        );
        assert_eq!(registry.room_count(), 2);
    }
}
