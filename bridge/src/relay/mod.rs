//! Relay wire plumbing: the `{topic, type, payload, timestamp}` frame codec
//! and the WebSocket transport wrapper.

pub mod frame;
pub mod socket;

pub use frame::{AckMessage, FrameKind, RelayFrame};
pub use socket::{RelaySocket, SocketEvent};
