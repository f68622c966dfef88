//! # roomcast-protocol
//!
//! Wire protocol for the roomcast signaling relay.
//!
//! Every message on a room socket is a JSON object carrying a string `type`.
//! The server understands a small control vocabulary and relays everything
//! else untouched.
//!
//! ## Message Types
//!
//! - `hello` - Sent once to a client after it joins (server to client)
//! - `clientJoin` / `clientPart` - Roster changes (server to client)
//! - `setTopic` - Replace the room topic (both directions)
//! - anything else - Relayed to peers, optionally directed with `target`
//!
//! ## Example
//!
//! ```rust
//! use roomcast_protocol::{codec, ClientMessage};
//!
//! let msg = codec::decode(r#"{"type":"offer","payload":{"sdp":"..."}}"#).unwrap();
//! assert!(matches!(msg, ClientMessage::Relay(_)));
//! ```

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, encode_relay, ProtocolError};
pub use messages::{ClientMessage, Hello, RelayMessage, ServerMessage, Target};
