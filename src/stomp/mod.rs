//! STOMP 1.2 wire layer: frames, codec, and heart-beat negotiation.
//!
//! This module knows nothing about subscriptions or sockets; it only turns
//! [`Frame`] values into text and back.

pub mod frame;
pub mod heartbeat;

pub use frame::{Command, Frame, FrameError, decode_all};
pub use heartbeat::HeartBeat;

/// Protocol versions offered in the `accept-version` header.
pub const ACCEPT_VERSION: &str = "1.2,1.1,1.0";
