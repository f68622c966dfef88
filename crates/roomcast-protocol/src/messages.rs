//! Message types for the roomcast protocol.
//!
//! Server-originated messages form a closed set. Client messages are either a
//! topic change, which the server interprets, or an opaque relay message that
//! keeps every field the client sent.

use serde::Serialize;
use serde_json::{Map, Value};

/// Reserved type tags.
pub mod types {
    pub const HELLO: &str = "hello";
    pub const CLIENT_JOIN: &str = "clientJoin";
    pub const CLIENT_PART: &str = "clientPart";
    pub const SET_TOPIC: &str = "setTopic";
}

/// Field names of the message envelope.
pub mod fields {
    pub const TYPE: &str = "type";
    pub const PAYLOAD: &str = "payload";
    pub const TARGET: &str = "target";
    pub const CLIENT_ID: &str = "clientid";
}

/// Welcome payload sent to a client right after it joins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hello {
    /// The id the server assigned to the joining client.
    pub clientid: String,
    /// Current room topic.
    pub topic: Value,
    /// Clients that were already in the room.
    pub clients: Vec<String>,
}

/// A message originated by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome, delivered only to the joining client.
    #[serde(rename = "hello")]
    Hello(Hello),

    /// A client joined. Payload is its id.
    #[serde(rename = "clientJoin")]
    ClientJoin(String),

    /// A client left. Payload is its id.
    #[serde(rename = "clientPart")]
    ClientPart(String),

    /// The topic changed. Payload is the new topic.
    #[serde(rename = "setTopic")]
    SetTopic(Value),
}

impl ServerMessage {
    /// Get the type tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello(_) => types::HELLO,
            ServerMessage::ClientJoin(_) => types::CLIENT_JOIN,
            ServerMessage::ClientPart(_) => types::CLIENT_PART,
            ServerMessage::SetTopic(_) => types::SET_TOPIC,
        }
    }

    /// Create a hello message.
    #[must_use]
    pub fn hello(clientid: impl Into<String>, topic: Value, clients: Vec<String>) -> Self {
        ServerMessage::Hello(Hello {
            clientid: clientid.into(),
            topic,
            clients,
        })
    }

    /// Create a clientJoin message.
    #[must_use]
    pub fn client_join(clientid: impl Into<String>) -> Self {
        ServerMessage::ClientJoin(clientid.into())
    }

    /// Create a clientPart message.
    #[must_use]
    pub fn client_part(clientid: impl Into<String>) -> Self {
        ServerMessage::ClientPart(clientid.into())
    }

    /// Create a setTopic message.
    #[must_use]
    pub fn set_topic(topic: Value) -> Self {
        ServerMessage::SetTopic(topic)
    }
}

/// An application message the server relays without interpreting.
///
/// The full JSON object is kept so that unknown fields reach the peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RelayMessage {
    fields: Map<String, Value>,
}

impl RelayMessage {
    /// Wrap an already validated envelope object.
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get the type tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.fields
            .get(fields::TYPE)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Get where the message is addressed.
    #[must_use]
    pub fn target(&self) -> Target<'_> {
        match self.fields.get(fields::TARGET) {
            None => Target::Peers,
            Some(Value::String(id)) => Target::Client(id),
            Some(_) => Target::Unaddressable,
        }
    }

    /// Stamp the sender id, replacing whatever the client put there.
    pub fn stamp_sender(&mut self, clientid: impl Into<String>) {
        self.fields
            .insert(fields::CLIENT_ID.to_string(), Value::String(clientid.into()));
    }
}

/// Addressing of a relay message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// No `target`: every peer of the sender.
    Peers,
    /// One client, by id.
    Client(&'a str),
    /// A `target` that is not a string. It matches no client.
    Unaddressable,
}

/// A message received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Replace the room topic.
    SetTopic(Value),
    /// Relay to peers.
    Relay(RelayMessage),
}

impl ClientMessage {
    /// Get the type tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            ClientMessage::SetTopic(_) => types::SET_TOPIC,
            ClientMessage::Relay(msg) => msg.kind(),
        }
    }
}
