//! Transport seam between the STOMP client and the socket.
//!
//! A [`Connector`] opens a [`Link`]: an outbound frame queue plus control
//! channels, backed by a task that owns the actual socket and reports
//! everything it sees as [`TransportEvent`]s. The client never touches the
//! socket directly, which lets tests swap in [`memory::MemoryConnector`].

pub mod memory;
pub mod sockjs;
pub mod websocket;

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::error::RealtimeError;
use crate::stomp::Frame;

pub use memory::{MemoryConnector, MemoryPeer};
pub use websocket::{Framing, WebSocketConnector};

/// Heart-beat intervals negotiated for one STOMP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatTiming {
    /// How often the transport writes a heart-beat EOL (zero = never).
    pub send: Duration,
    /// How often the broker promised to send something (zero = no check).
    pub expect: Duration,
}

impl HeartbeatTiming {
    /// How long the socket may stay silent before it is considered dead:
    /// twice the expected interval, or `None` when the broker sends no
    /// heart-beats.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        (!self.expect.is_zero()).then(|| self.expect.saturating_mul(2))
    }
}

/// What the transport task reports to the client.
#[derive(Debug)]
pub enum TransportEvent {
    /// A socket is open; the client should send `CONNECT`.
    Opened,
    /// A frame arrived from the broker.
    Frame(Frame),
    /// The socket closed. The transport may reopen it after its delay.
    Closed {
        /// Close reason for logs and `on_disconnect`.
        reason: String,
    },
    /// A handshake, socket or decode failure.
    Failed(RealtimeError),
}

/// Settings the transport needs to open and keep a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Fixed delay between reconnect attempts. Zero disables reconnects.
    pub reconnect_delay: Duration,
}

/// Opens transports for the client.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Starts a transport task reporting to `events` and returns its link.
    ///
    /// Must be called from within a Tokio runtime.
    fn open(
        &self,
        options: &TransportOptions,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Link;
}

/// Client-side handle on a running transport task.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<Frame>,
    heartbeat: watch::Sender<HeartbeatTiming>,
    shutdown: watch::Sender<bool>,
}

/// Task-side ends of a [`Link`].
#[derive(Debug)]
pub struct LinkEnds {
    /// Frames the client wants written.
    pub outbound: mpsc::UnboundedReceiver<Frame>,
    /// Negotiated heart-beat intervals.
    pub heartbeat: watch::Receiver<HeartbeatTiming>,
    /// Flips to `true` when the client closes the link.
    pub shutdown: watch::Receiver<bool>,
}

impl Link {
    /// Creates a link and the ends the transport task consumes.
    #[must_use]
    pub fn pair() -> (Self, LinkEnds) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (heartbeat_tx, heartbeat_rx) = watch::channel(HeartbeatTiming::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                outbound: outbound_tx,
                heartbeat: heartbeat_tx,
                shutdown: shutdown_tx,
            },
            LinkEnds {
                outbound: outbound_rx,
                heartbeat: heartbeat_rx,
                shutdown: shutdown_rx,
            },
        )
    }

    /// Queues a frame for writing. Returns `false` if the task has exited.
    pub fn send(&self, frame: Frame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Sets the heart-beat intervals the task sends and checks.
    pub fn set_heartbeat(&self, timing: HeartbeatTiming) {
        self.heartbeat.send_replace(timing);
    }

    /// Asks the task to flush queued frames, close the socket and stop.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}
