//! The real-time side of the chat service: the live-peer registry and the
//! per-connection WebSocket session protocol.

pub mod registry;
pub mod session;
