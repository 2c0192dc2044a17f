//! Connection and per-destination subscription states.

use std::fmt;

/// Lifecycle of the shared STOMP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport is open and none is being opened.
    #[default]
    Disconnected,
    /// The transport is opening, or reconnecting after a drop.
    Connecting,
    /// The broker accepted the session with `CONNECTED`.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// State of one destination in the subscription registry.
///
/// ```text
/// Unsubscribed ──subscribe──▶ PendingSubscribe ──CONNECTED──▶ Active
///      ▲                            │                          │
///      └────────unsubscribe─────────┴──────unsubscribe─────────┘
/// ```
///
/// `subscribe` while already connected goes straight to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Not known to the registry.
    Unsubscribed,
    /// Queued until the connection reaches [`ConnectionState::Connected`].
    PendingSubscribe,
    /// `SUBSCRIBE` has been sent on the current connection.
    Active,
}
