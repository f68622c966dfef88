//! # roomcast-transport
//!
//! Connection abstraction for the roomcast relay.
//!
//! The relay core only needs two things from a connection:
//!
//! - a [`ConnectionHandle`] it can push encoded messages into without waiting
//! - a [`MessageSource`] it can pull inbound text messages from
//!
//! [`queue`] provides a bounded, non-blocking handle backed by a tokio channel.
//! The `websocket` feature adapts an axum WebSocket to both traits, with a
//! writer task that also drives the heartbeat.
//!
//! ```rust,ignore
//! use roomcast_transport::{websocket, MessageSource};
//!
//! async fn handle(socket: axum::extract::ws::WebSocket) {
//!     let (handle, mut source) = websocket::split(socket, &Default::default());
//!     while let Ok(Some(text)) = source.recv().await {
//!         // Process text
//!     }
//! }
//! ```

pub mod queue;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use queue::{outbound_queue, Outbound, QueuedHandle};
pub use traits::{ConnectionHandle, MessageSource, TransportError};
