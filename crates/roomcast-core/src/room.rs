//! Room state for roomcast.
//!
//! A room is a topic plus the set of joined clients. Rooms are owned by the
//! [`RoomRegistry`](crate::RoomRegistry), which serializes all access to a
//! given room.

use crate::id::{ClientId, RoomId};
use roomcast_transport::ConnectionHandle;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A connection handle shared between the room and its session.
pub type SharedHandle = Arc<dyn ConnectionHandle>;

/// What a client sees at the moment it joins.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSnapshot {
    /// The id assigned to the joining client.
    pub client_id: ClientId,
    /// The room topic at join time.
    pub topic: Value,
    /// Clients already present, not including the new one.
    pub clients: Vec<ClientId>,
}

/// A room with its topic and joined clients.
pub struct Room {
    id: RoomId,
    topic: Value,
    clients: HashMap<ClientId, SharedHandle>,
    created_at: Instant,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: RoomId, topic: Value) -> Self {
        Self {
            id,
            topic,
            clients: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Get the current topic.
    #[must_use]
    pub fn topic(&self) -> &Value {
        &self.topic
    }

    /// Replace the topic, returning the previous one.
    pub fn set_topic(&mut self, topic: Value) -> Value {
        std::mem::replace(&mut self.topic, topic)
    }

    /// Add a client, minting its id.
    ///
    /// The snapshot is taken before the new client is inserted.
    pub fn join(&mut self, handle: SharedHandle) -> JoinSnapshot {
        let client_id = loop {
            let candidate = ClientId::generate();
            if !self.clients.contains_key(&candidate) {
                break candidate;
            }
        };

        let snapshot = JoinSnapshot {
            client_id: client_id.clone(),
            topic: self.topic.clone(),
            clients: self.client_ids(),
        };

        self.clients.insert(client_id, handle);
        debug!(room = %self.id, client = %snapshot.client_id, clients = self.clients.len(), "Client joined");

        snapshot
    }

    /// Remove a client.
    ///
    /// Returns its handle if it was present.
    pub fn leave(&mut self, client_id: &str) -> Option<SharedHandle> {
        let handle = self.clients.remove(client_id);
        if handle.is_some() {
            debug!(room = %self.id, client = %client_id, clients = self.clients.len(), "Client left");
        }
        handle
    }

    /// Get a client's handle.
    #[must_use]
    pub fn handle(&self, client_id: &str) -> Option<&SharedHandle> {
        self.clients.get(client_id)
    }

    /// Iterate over the joined clients.
    pub fn clients(&self) -> impl Iterator<Item = (&ClientId, &SharedHandle)> {
        self.clients.iter()
    }

    /// Get all joined client ids.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().cloned().collect()
    }

    /// Check if a client is joined.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Get the number of joined clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Check if the room has no clients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Time since the room was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::handle;
    use serde_json::json;

    #[test]
    fn test_room_creation() {
        let room = Room::new("room-1".into(), json!("t1"));
        assert_eq!(room.id().as_str(), "room-1");
        assert_eq!(room.topic(), &json!("t1"));
        assert!(room.is_empty());
    }

    #[test]
    fn test_join_snapshot_excludes_newcomer() {
        let mut room = Room::new("room".into(), json!({"k": 1}));
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();

        let first = room.join(a);
        assert!(first.clients.is_empty());
        assert_eq!(first.topic, json!({"k": 1}));

        let second = room.join(b);
        assert_eq!(second.clients, vec![first.client_id.clone()]);
        assert_ne!(first.client_id, second.client_id);
        assert_eq!(room.client_count(), 2);
    }

    #[test]
    fn test_leave() {
        let mut room = Room::new("room".into(), Value::Null);
        let (a, _rx) = handle();
        let joined = room.join(a);

        assert!(room.leave(joined.client_id.as_str()).is_some());
        assert!(room.is_empty());
        // Leaving twice is a no-op
        assert!(room.leave(joined.client_id.as_str()).is_none());
    }

    #[test]
    fn test_set_topic() {
        let mut room = Room::new("room".into(), json!("t1"));
        let previous = room.set_topic(json!(["any", "shape"]));
        assert_eq!(previous, json!("t1"));
        assert_eq!(room.topic(), &json!(["any", "shape"]));
    }
}
