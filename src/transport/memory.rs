//! In-memory transport for driving the client without sockets.
//!
//! Every [`Connector::open`] call hands a [`MemoryPeer`] to whoever holds the
//! receiver returned by [`MemoryConnector::channel`]. The peer plays the broker:
//! it reads the frames the client writes and injects transport events.

use tokio::sync::mpsc;

use super::{Connector, HeartbeatTiming, Link, LinkEnds, TransportEvent, TransportOptions};
use crate::error::RealtimeError;
use crate::stomp::{Command, Frame};

/// Connector whose links are backed by channels.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Creates the connector and the receiver yielding one peer per opened link.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers }, rx)
    }
}

impl Connector for MemoryConnector {
    fn open(
        &self,
        options: &TransportOptions,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Link {
        let (link, ends) = Link::pair();
        let peer = MemoryPeer {
            options: options.clone(),
            events,
            ends,
        };
        if self.peers.send(peer).is_err() {
            tracing::debug!("memory connector has no listener; link is inert");
        }
        link
    }
}

/// Broker side of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    options: TransportOptions,
    events: mpsc::UnboundedSender<TransportEvent>,
    ends: LinkEnds,
}

impl MemoryPeer {
    /// Options the client opened the link with.
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Reports the socket as open; the client answers with `CONNECT`.
    pub fn open_socket(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Sends `CONNECTED` without heart-beats.
    pub fn accept(&self) {
        self.send_frame(
            Frame::new(Command::Connected)
                .header("version", "1.2")
                .header("heart-beat", "0,0"),
        );
    }

    /// Opens the socket, waits for the client's `CONNECT`, then accepts it.
    /// Returns the `CONNECT` frame.
    pub async fn handshake(&mut self) -> Option<Frame> {
        self.open_socket();
        let connect = self.next_frame().await?;
        self.accept();
        Some(connect)
    }

    /// Injects an arbitrary broker frame.
    pub fn send_frame(&self, frame: Frame) {
        self.emit(TransportEvent::Frame(frame));
    }

    /// Delivers a `MESSAGE` frame.
    pub fn deliver(&self, destination: &str, subscription: &str, body: &str) {
        self.send_frame(
            Frame::new(Command::Message)
                .header("destination", destination)
                .header("subscription", subscription)
                .header("message-id", uuid::Uuid::new_v4().to_string())
                .body(body),
        );
    }

    /// Reports the socket as closed.
    pub fn drop_socket(&self, reason: &str) {
        self.emit(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    /// Reports a transport failure.
    pub fn fail(&self, err: RealtimeError) {
        self.emit(TransportEvent::Failed(err));
    }

    /// Waits for the next frame the client writes.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.ends.outbound.recv().await
    }

    /// Returns every frame written so far without waiting.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.ends.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Heart-beat intervals the client last negotiated.
    #[must_use]
    pub fn heartbeat(&self) -> HeartbeatTiming {
        *self.ends.heartbeat.borrow()
    }

    /// Returns `true` once the client has closed the link.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.ends.shutdown.borrow()
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("client dispatcher gone; event discarded");
        }
    }
}
