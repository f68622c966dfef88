//! # roomcast-core
//!
//! Room registry and relay engine for the roomcast signaling server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **RoomRegistry** - Owns every room, keyed by an unguessable id
//! - **Room** - Topic plus the joined clients
//! - **Broadcaster** - Best-effort fan-out to a room's clients
//! - **SessionController** - One connection's join, dispatch and leave
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │  Connection │────▶│ SessionController│────▶│ RoomRegistry │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//!                                                     │
//!                                                     ▼
//!                                              ┌──────────────┐
//!                                              │ Room +       │
//!                                              │ Broadcaster  │
//!                                              └──────────────┘
//! ```

pub mod broadcast;
pub mod id;
pub mod registry;
pub mod room;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{Broadcaster, DeliveryReport, Recipients};
pub use id::{ClientId, RoomId};
pub use registry::{
    Joined, LeaveOutcome, RegistryConfig, RegistryStats, RelayError, RoomRegistry,
};
pub use room::{JoinSnapshot, Room, SharedHandle};
pub use session::{CloseReason, SessionController, SessionState, SessionSummary};
