//! The shared STOMP client.
//!
//! [`StompClient`] is the single point of contact with the real-time
//! transport. It is cheap to clone; every clone talks to the same
//! connection and the same subscription registry, so one instance built at
//! start-up can be handed to every part of the application that needs it.
//!
//! Internally, one dispatcher task per [`StompClient::connect`] consumes
//! transport events in order. All bookkeeping happens under a single mutex
//! that is never held across an `.await` or while a user callback runs, so
//! handlers may freely call back into the client.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::handle::SubscriptionHandle;
use super::message::StompMessage;
use super::options::{
    ConnectCallback, ConnectOptions, DisconnectCallback, ErrorCallback, ResubscribePolicy,
};
use super::registry::{Removed, Subscription, SubscriptionId, SubscriptionRegistry};
use super::state::{ConnectionState, SubscriptionState};
use crate::error::RealtimeError;
use crate::stomp::{Command, Frame, HeartBeat};
use crate::transport::{Connector, HeartbeatTiming, Link, TransportEvent, TransportOptions};

/// Why a publish did not reach the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No STOMP session is established.
    NotConnected,
    /// The body could not be serialized.
    Serialization(String),
    /// The transport task has already stopped.
    LinkClosed,
}

/// Result of [`StompClient::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PublishOutcome {
    /// The frame was handed to the transport.
    Sent,
    /// The frame was discarded; nothing is retried.
    Dropped(DropReason),
}

impl PublishOutcome {
    /// Returns `true` for [`PublishOutcome::Sent`].
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Per-`connect` settings kept while the session lives.
struct Session {
    connect_frame: Frame,
    heartbeat: HeartBeat,
    resubscribe: ResubscribePolicy,
    reconnects: bool,
    on_connect: Option<ConnectCallback>,
    on_error: Option<ErrorCallback>,
    on_disconnect: Option<DisconnectCallback>,
}

struct Shared {
    state: ConnectionState,
    registry: SubscriptionRegistry,
    link: Option<Link>,
    session: Option<Session>,
    /// Bumped on every connect/disconnect so a stale dispatcher stops.
    generation: u64,
}

struct Inner {
    connector: Arc<dyn Connector>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
}

/// STOMP-over-WebSocket client with an owned subscription registry.
#[derive(Clone)]
pub struct StompClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for StompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StompClient")
            .field("connector", &self.inner.connector)
            .field("state", &*self.inner.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl StompClient {
    /// Creates a disconnected client that opens transports through `connector`.
    #[must_use]
    pub fn new(connector: impl Connector + 'static) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                connector: Arc::new(connector),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    registry: SubscriptionRegistry::new(),
                    link: None,
                    session: None,
                    generation: 0,
                }),
                state_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        shared.state = state;
        self.inner.state_tx.send_replace(state);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Receiver notified on every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Opens the connection.
    ///
    /// Returns immediately; the handshake completes on the dispatcher task,
    /// which then flushes pending subscriptions in order and invokes
    /// `on_connect`. Calling this while connecting or connected only logs.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, options: ConnectOptions) {
        let mut shared = self.lock();
        if shared.state != ConnectionState::Disconnected {
            tracing::info!(state = %shared.state, "connect ignored; client already active");
            return;
        }

        shared.generation = shared.generation.wrapping_add(1);
        let generation = shared.generation;
        let transport = TransportOptions {
            url: options.url.clone(),
            reconnect_delay: options.reconnect_delay,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        shared.link = Some(self.inner.connector.open(&transport, events_tx));
        shared.session = Some(Session {
            connect_frame: options.connect_frame(),
            heartbeat: options.heartbeat,
            resubscribe: options.resubscribe,
            reconnects: !options.reconnect_delay.is_zero(),
            on_connect: options.on_connect,
            on_error: options.on_error,
            on_disconnect: options.on_disconnect,
        });
        self.set_state(&mut shared, ConnectionState::Connecting);
        drop(shared);

        tracing::info!(url = %transport.url, "connecting");
        tokio::spawn(dispatch(Arc::downgrade(&self.inner), generation, events_rx));
    }

    /// Closes the connection and forgets every subscription.
    ///
    /// Active subscriptions are unsubscribed on the wire when connected,
    /// the pending queue is purged, and the transport is shut down. Safe to
    /// call in any state.
    pub fn disconnect(&self) {
        let mut shared = self.lock();
        let was = shared.state;
        let active = shared.registry.clear();
        if let Some(link) = shared.link.take() {
            if was == ConnectionState::Connected {
                for sub in &active {
                    link.send(unsubscribe_frame(sub.id));
                }
                link.send(Frame::new(Command::Disconnect));
            }
            link.close();
        }
        shared.session = None;
        shared.generation = shared.generation.wrapping_add(1);
        self.set_state(&mut shared, ConnectionState::Disconnected);
        drop(shared);

        if was != ConnectionState::Disconnected {
            tracing::info!(released = active.len(), "disconnected");
        }
    }

    /// Publishes `body` as JSON on `destination`.
    ///
    /// Nothing is queued: when no session is established the frame is
    /// dropped with a warning and [`DropReason::NotConnected`] is returned.
    pub fn publish<T: Serialize + ?Sized>(&self, destination: &str, body: &T) -> PublishOutcome {
        self.publish_with_headers(destination, body, &[])
    }

    /// Like [`Self::publish`], with extra `SEND` headers.
    pub fn publish_with_headers<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> PublishOutcome {
        match serde_json::to_string(body) {
            Ok(json) => self.send(destination, json, "application/json", headers),
            Err(err) => {
                tracing::warn!(destination, error = %err, "publish dropped; body not serializable");
                PublishOutcome::Dropped(DropReason::Serialization(err.to_string()))
            }
        }
    }

    /// Publishes a plain-text body on `destination`.
    pub fn publish_text(&self, destination: &str, body: impl Into<String>) -> PublishOutcome {
        self.send(destination, body.into(), "text/plain", &[])
    }

    fn send(
        &self,
        destination: &str,
        body: String,
        content_type: &str,
        headers: &[(&str, &str)],
    ) -> PublishOutcome {
        let shared = self.lock();
        let link = match (&shared.link, shared.state) {
            (Some(link), ConnectionState::Connected) => link,
            _ => {
                tracing::warn!(destination, state = %shared.state, "publish dropped; not connected");
                return PublishOutcome::Dropped(DropReason::NotConnected);
            }
        };
        let mut frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", content_type);
        for (name, value) in headers {
            frame = frame.header(*name, *value);
        }
        if link.send(frame.body(body)) {
            tracing::debug!(destination, "published");
            PublishOutcome::Sent
        } else {
            tracing::warn!(destination, "publish dropped; transport stopped");
            PublishOutcome::Dropped(DropReason::LinkClosed)
        }
    }

    /// Subscribes `handler` to `destination`.
    ///
    /// Idempotent per destination: if an active or pending subscription
    /// already exists, a handle to it is returned and `handler` is dropped.
    /// When not connected the request is queued and sent, in order, on the
    /// next `CONNECTED`.
    pub fn subscribe<F>(&self, destination: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(StompMessage) + Send + Sync + 'static,
    {
        let destination = destination.into();
        let mut guard = self.lock();
        if let Some((id, state)) = guard.registry.lookup(&destination) {
            tracing::debug!(%destination, ?state, "already subscribed");
            drop(guard);
            return SubscriptionHandle::new(self.clone(), destination, id);
        }

        let shared = &mut *guard;
        let sub = shared.registry.allocate(destination.clone(), Arc::new(handler));
        let id = sub.id;
        match (&shared.link, shared.state) {
            (Some(link), ConnectionState::Connected) if link.send(subscribe_frame(&sub)) => {
                tracing::debug!(%destination, %id, "subscribed");
                shared.registry.insert_active(sub);
            }
            _ => {
                tracing::debug!(%destination, %id, "subscription queued until connected");
                shared.registry.push_pending(sub);
            }
        }
        drop(guard);
        SubscriptionHandle::new(self.clone(), destination, id)
    }

    /// Removes the subscription for `destination`, active or pending.
    ///
    /// Returns `true` if anything was removed. Unknown destinations are a no-op.
    pub fn unsubscribe(&self, destination: &str) -> bool {
        let mut shared = self.lock();
        let removed = shared.registry.remove(destination);
        Self::finish_unsubscribe(&shared, destination, removed)
    }

    /// Unsubscribes only if `destination` still carries subscription `id`.
    pub(crate) fn unsubscribe_if_current(&self, destination: &str, id: SubscriptionId) -> bool {
        let mut shared = self.lock();
        let removed = shared.registry.remove_if_id(destination, id);
        Self::finish_unsubscribe(&shared, destination, removed)
    }

    fn finish_unsubscribe(shared: &Shared, destination: &str, removed: Removed) -> bool {
        if let Some(sub) = &removed.active {
            if let (Some(link), ConnectionState::Connected) = (&shared.link, shared.state) {
                link.send(unsubscribe_frame(sub.id));
            }
            tracing::debug!(destination, id = %sub.id, "unsubscribed");
        } else if removed.pending {
            tracing::debug!(destination, "pending subscription purged");
        }
        removed.active.is_some() || removed.pending
    }

    /// Returns the registry entry for `destination`, if any.
    pub(crate) fn lookup(&self, destination: &str) -> Option<(SubscriptionId, SubscriptionState)> {
        self.lock().registry.lookup(destination)
    }

    /// State of `destination` in the registry.
    #[must_use]
    pub fn subscription_state(&self, destination: &str) -> SubscriptionState {
        self.lock().registry.state_of(destination)
    }

    /// Returns `true` if `destination` is subscribed on the current connection.
    #[must_use]
    pub fn is_active(&self, destination: &str) -> bool {
        self.lock().registry.is_active(destination)
    }

    /// Returns `true` if `destination` is waiting for the connection.
    #[must_use]
    pub fn is_pending(&self, destination: &str) -> bool {
        self.lock().registry.is_pending(destination)
    }

    /// Active destinations, oldest first.
    #[must_use]
    pub fn active_destinations(&self) -> Vec<String> {
        self.lock().registry.active_destinations()
    }

    /// Pending destinations in flush order.
    #[must_use]
    pub fn pending_destinations(&self) -> Vec<String> {
        self.lock().registry.pending_destinations()
    }

    /// Number of registry entries, active and pending.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Applies one transport event. Returns `false` once the event belongs
    /// to a connection that has since been replaced or closed.
    fn handle_event(&self, generation: u64, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => self.on_opened(generation),
            TransportEvent::Frame(frame) => self.on_frame(generation, frame),
            TransportEvent::Closed { reason } => self.on_closed(generation, &reason),
            TransportEvent::Failed(err) => {
                let callback = {
                    let shared = self.lock();
                    let Some(session) = current(&shared, generation) else {
                        return false;
                    };
                    session.on_error.clone()
                };
                tracing::error!(error = %err, "transport failure");
                if let Some(on_error) = callback {
                    on_error(err);
                }
                true
            }
        }
    }

    fn on_opened(&self, generation: u64) -> bool {
        let shared = self.lock();
        let Some(session) = current(&shared, generation) else {
            return false;
        };
        if let Some(link) = &shared.link {
            link.send(session.connect_frame.clone());
        }
        tracing::debug!("socket open; CONNECT sent");
        true
    }

    fn on_frame(&self, generation: u64, frame: Frame) -> bool {
        match frame.command {
            Command::Connected => self.on_connected(generation, &frame),
            Command::Message => {
                let handler = {
                    let shared = self.lock();
                    if current(&shared, generation).is_none() {
                        return false;
                    }
                    frame
                        .get("subscription")
                        .and_then(|id| shared.registry.handler_for_id(id))
                        .or_else(|| {
                            frame
                                .get("destination")
                                .and_then(|d| shared.registry.handler_for_destination(d))
                        })
                };
                match handler {
                    Some(handler) => handler(StompMessage::from_frame(frame)),
                    None => tracing::debug!(
                        destination = frame.get("destination").unwrap_or_default(),
                        "message for unknown subscription dropped"
                    ),
                }
                true
            }
            Command::Error => {
                let callback = {
                    let shared = self.lock();
                    let Some(session) = current(&shared, generation) else {
                        return false;
                    };
                    session.on_error.clone()
                };
                let err = RealtimeError::Protocol {
                    message: frame.get("message").unwrap_or("unspecified").to_string(),
                    details: (!frame.body.is_empty()).then(|| frame.body.clone()),
                };
                tracing::error!(error = %err, "broker sent ERROR frame");
                if let Some(on_error) = callback {
                    on_error(err);
                }
                true
            }
            Command::Receipt => {
                tracing::debug!(receipt = frame.get("receipt-id").unwrap_or_default(), "receipt");
                true
            }
            other => {
                tracing::debug!(command = %other, "unexpected frame from broker ignored");
                true
            }
        }
    }

    fn on_connected(&self, generation: u64, frame: &Frame) -> bool {
        let mut guard = self.lock();
        let shared = &mut *guard;
        let Some(session) = current(shared, generation) else {
            return false;
        };
        let server_beat = frame.get("heart-beat").map(HeartBeat::parse).unwrap_or_default();
        let timing = HeartbeatTiming {
            send: session.heartbeat.negotiate_outgoing(&server_beat),
            expect: session.heartbeat.negotiate_incoming(&server_beat),
        };
        let on_connect = session.on_connect.clone();

        let mut flushed = 0usize;
        if let Some(link) = &shared.link {
            link.set_heartbeat(timing);
            for sub in shared.registry.drain_pending() {
                if link.send(subscribe_frame(&sub)) {
                    flushed += 1;
                    shared.registry.insert_active(sub);
                } else {
                    shared.registry.push_pending(sub);
                }
            }
        }
        self.set_state(shared, ConnectionState::Connected);
        drop(guard);

        tracing::info!(
            version = frame.get("version").unwrap_or("1.0"),
            heartbeat_send_ms = u64::try_from(timing.send.as_millis()).unwrap_or(u64::MAX),
            heartbeat_expect_ms = u64::try_from(timing.expect.as_millis()).unwrap_or(u64::MAX),
            flushed,
            "stomp session established"
        );
        if let Some(on_connect) = on_connect {
            on_connect();
        }
        true
    }

    fn on_closed(&self, generation: u64, reason: &str) -> bool {
        let mut guard = self.lock();
        let shared = &mut *guard;
        let Some(session) = current(shared, generation) else {
            return false;
        };
        let was = shared.state;
        let policy = session.resubscribe;
        let reconnects = session.reconnects;
        let on_disconnect = session.on_disconnect.clone();

        match policy {
            ResubscribePolicy::Replay => {
                let requeued = shared.registry.requeue_active();
                tracing::debug!(requeued, "active subscriptions queued for replay");
            }
            ResubscribePolicy::Discard => {
                let dropped = shared.registry.clear_active();
                tracing::debug!(dropped, "active subscriptions discarded");
            }
        }

        if reconnects {
            if let Some(link) = &shared.link {
                link.set_heartbeat(HeartbeatTiming::default());
            }
            self.set_state(shared, ConnectionState::Connecting);
        } else {
            if let Some(link) = shared.link.take() {
                link.close();
            }
            shared.session = None;
            self.set_state(shared, ConnectionState::Disconnected);
        }
        drop(guard);

        tracing::warn!(reason, reconnects, "connection lost");
        if was == ConnectionState::Connected
            && let Some(on_disconnect) = on_disconnect
        {
            on_disconnect(reason);
        }
        reconnects
    }
}

/// Returns the session if `generation` is still the live connection.
fn current(shared: &Shared, generation: u64) -> Option<&Session> {
    if shared.generation == generation {
        shared.session.as_ref()
    } else {
        None
    }
}

fn subscribe_frame(sub: &Subscription) -> Frame {
    Frame::new(Command::Subscribe)
        .header("id", sub.id.to_string())
        .header("destination", sub.destination.as_str())
        .header("ack", "auto")
}

fn unsubscribe_frame(id: SubscriptionId) -> Frame {
    Frame::new(Command::Unsubscribe).header("id", id.to_string())
}

async fn dispatch(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let client = StompClient { inner };
        if !client.handle_event(generation, event) {
            break;
        }
    }
    tracing::debug!(generation, "dispatcher stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::{MemoryConnector, MemoryPeer};

    const WAIT: Duration = Duration::from_secs(2);

    type Inbox = mpsc::UnboundedReceiver<StompMessage>;

    fn recorder() -> (impl Fn(StompMessage) + Clone + Send + Sync + 'static, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |msg: StompMessage| {
            let _ = tx.send(msg);
        };
        (handler, rx)
    }

    async fn wait_for_state(client: &StompClient, state: ConnectionState) -> bool {
        let mut rx = client.state_changes();
        matches!(
            tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state)).await,
            Ok(Ok(_))
        )
    }

    async fn next_message(inbox: &mut Inbox) -> StompMessage {
        let Ok(Some(msg)) = tokio::time::timeout(WAIT, inbox.recv()).await else {
            panic!("no message delivered");
        };
        msg
    }

    fn options() -> ConnectOptions {
        ConnectOptions::new("ws://school.test/ws-attendance")
    }

    async fn open_peer(
        client: &StompClient,
        peers: &mut mpsc::UnboundedReceiver<MemoryPeer>,
        opts: ConnectOptions,
    ) -> MemoryPeer {
        client.connect(opts);
        let Some(peer) = peers.recv().await else {
            panic!("connector was not asked to open a link");
        };
        peer
    }

    async fn connected_client() -> (StompClient, MemoryPeer) {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let mut peer = open_peer(&client, &mut peers, options()).await;
        let Some(connect) = peer.handshake().await else {
            panic!("client did not send CONNECT");
        };
        assert_eq!(connect.command, Command::Connect);
        assert!(wait_for_state(&client, ConnectionState::Connected).await);
        (client, peer)
    }

    fn commands(frames: &[Frame], command: Command) -> Vec<&Frame> {
        frames.iter().filter(|f| f.command == command).collect()
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_per_destination() {
        let (client, mut peer) = connected_client().await;
        let (handler, mut inbox) = recorder();

        let first = client.subscribe("/topic/class/1/sessions", handler.clone());
        let second = client.subscribe("/topic/class/1/sessions", handler);
        assert_eq!(first, second);
        assert_eq!(client.subscription_count(), 1);

        let frames = peer.drain_frames();
        assert_eq!(commands(&frames, Command::Subscribe).len(), 1);

        let sub_id = first.id().to_string();
        peer.deliver("/topic/class/1/sessions", &sub_id, r#"{"n":1}"#);
        peer.deliver("/topic/class/1/sessions", &sub_id, r#"{"n":2}"#);
        let one = next_message(&mut inbox).await;
        let two = next_message(&mut inbox).await;
        assert_eq!(one.body.as_json().and_then(|v| v.get("n")).cloned(), Some(1.into()));
        assert_eq!(two.body.as_json().and_then(|v| v.get("n")).cloned(), Some(2.into()));
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn pending_subscriptions_flush_in_order() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let (handler, _inbox) = recorder();

        let h1 = client.subscribe("/d1", handler.clone());
        assert_eq!(h1.state(), SubscriptionState::PendingSubscribe);
        let mut peer = open_peer(&client, &mut peers, options()).await;
        let _h2 = client.subscribe("/d2", handler);
        assert_eq!(client.pending_destinations(), vec!["/d1", "/d2"]);
        assert!(peer.drain_frames().is_empty());

        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        let frames = peer.drain_frames();
        let destinations: Vec<&str> = commands(&frames, Command::Subscribe)
            .into_iter()
            .filter_map(|f| f.get("destination"))
            .collect();
        assert_eq!(destinations, vec!["/d1", "/d2"]);
        assert_eq!(client.active_destinations(), vec!["/d1", "/d2"]);
        assert!(client.pending_destinations().is_empty());
        assert_eq!(h1.state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn unsubscribe_while_pending_is_never_sent() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let (handler, _inbox) = recorder();

        let handle = client.subscribe("/topic/session/4/records", handler);
        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());

        let mut peer = open_peer(&client, &mut peers, options()).await;
        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        assert!(commands(&peer.drain_frames(), Command::Subscribe).is_empty());
        assert!(!client.is_active("/topic/session/4/records"));
        assert_eq!(client.subscription_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_tears_everything_down() {
        let (client, mut peer) = connected_client().await;
        let (handler, _inbox) = recorder();
        let old = client.subscribe("/a", handler.clone());
        let _ = peer.drain_frames();

        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.subscription_count(), 0);
        assert!(peer.is_closed());
        let frames = peer.drain_frames();
        assert_eq!(commands(&frames, Command::Unsubscribe).len(), 1);
        assert_eq!(commands(&frames, Command::Disconnect).len(), 1);

        // Starting fresh: a new subscription gets a new id, the old handle is inert.
        let fresh = client.subscribe("/a", handler);
        assert_ne!(fresh.id(), old.id());
        assert_eq!(old.state(), SubscriptionState::Unsubscribed);
        assert!(!old.unsubscribe());
        assert!(client.is_pending("/a"));

        client.disconnect();
        assert_eq!(client.subscription_count(), 0);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        client.connect(options());
        client.connect(options());
        assert!(peers.recv().await.is_some());
        assert!(peers.try_recv().is_err());
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let (connector, _peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        assert_eq!(
            client.publish("/app/session/1/records", &serde_json::json!({"x": 1})),
            PublishOutcome::Dropped(DropReason::NotConnected)
        );

        let (client, mut peer) = connected_client().await;
        let outcome = client.publish_with_headers(
            "/app/session/1/records",
            &serde_json::json!({"studentId": 9}),
            &[("x-client", "mobile")],
        );
        assert!(outcome.is_sent());
        let frames = peer.drain_frames();
        let sends = commands(&frames, Command::Send);
        let Some(send) = sends.first() else {
            panic!("no SEND frame");
        };
        assert_eq!(send.get("destination"), Some("/app/session/1/records"));
        assert_eq!(send.get("content-type"), Some("application/json"));
        assert_eq!(send.get("x-client"), Some("mobile"));
        assert_eq!(send.body, r#"{"studentId":9}"#);
    }

    #[tokio::test]
    async fn error_frame_reaches_on_error() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let opts = options().on_error(move |err| {
            let _ = err_tx.send(err.descriptor());
        });
        let mut peer = open_peer(&client, &mut peers, opts).await;
        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        peer.send_frame(
            Frame::new(Command::Error)
                .header("message", "access denied")
                .body("not your class"),
        );
        let Ok(Some(desc)) = tokio::time::timeout(WAIT, err_rx.recv()).await else {
            panic!("on_error not called");
        };
        assert_eq!(desc.code, 3001);
        assert_eq!(desc.details.as_deref(), Some("not your class"));
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn transport_failure_reaches_on_error() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let opts = options().on_error(move |err| {
            let _ = err_tx.send(err.error_code());
        });
        let peer = open_peer(&client, &mut peers, opts).await;
        peer.fail(RealtimeError::Connection("connection refused".into()));
        assert!(matches!(
            tokio::time::timeout(WAIT, err_rx.recv()).await,
            Ok(Some(2001))
        ));
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(peer.options().url, "ws://school.test/ws-attendance");
    }

    #[tokio::test]
    async fn reconnect_replays_active_subscriptions() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let (dc_tx, mut dc_rx) = mpsc::unbounded_channel();
        let opts = options().on_disconnect(move |reason| {
            let _ = dc_tx.send(reason.to_string());
        });
        let mut peer = open_peer(&client, &mut peers, opts).await;
        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        let (handler, _inbox) = recorder();
        let handle = client.subscribe("/topic/class/3/assignments", handler);
        let _ = peer.drain_frames();

        peer.drop_socket("network lost");
        assert!(wait_for_state(&client, ConnectionState::Connecting).await);
        assert!(client.is_pending("/topic/class/3/assignments"));
        let Ok(Some(reason)) = tokio::time::timeout(WAIT, dc_rx.recv()).await else {
            panic!("on_disconnect not called");
        };
        assert_eq!(reason, "network lost");

        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);
        let frames = peer.drain_frames();
        let subs = commands(&frames, Command::Subscribe);
        assert_eq!(subs.len(), 1);
        assert_eq!(
            subs.first().and_then(|f| f.get("id")),
            Some(handle.id().to_string().as_str())
        );
        assert_eq!(handle.state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn discard_policy_forgets_active_subscriptions() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let opts = options().with_resubscribe(ResubscribePolicy::Discard);
        let mut peer = open_peer(&client, &mut peers, opts).await;
        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        let (handler, _inbox) = recorder();
        let _ = client.subscribe("/a", handler);
        peer.drop_socket("gone");
        assert!(wait_for_state(&client, ConnectionState::Connecting).await);
        assert_eq!(client.subscription_state("/a"), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn no_reconnect_means_disconnected_after_close() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let opts = options().with_reconnect_delay(Duration::ZERO);
        let mut peer = open_peer(&client, &mut peers, opts).await;
        let _ = peer.handshake().await;
        assert!(wait_for_state(&client, ConnectionState::Connected).await);

        peer.drop_socket("server restart");
        assert!(wait_for_state(&client, ConnectionState::Disconnected).await);
        assert!(peer.is_closed());
        assert!(!client.publish_text("/app/x", "hi").is_sent());
    }

    #[tokio::test]
    async fn handlers_may_reenter_the_client() {
        let (client, mut peer) = connected_client().await;
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let reentrant = client.clone();
        let handle = client.subscribe("/topic/class/1/sessions", move |_msg| {
            let _ = reentrant.subscribe("/topic/session/8/records", |_| {});
            let _ = done_tx.send(());
        });
        peer.deliver("/topic/class/1/sessions", &handle.id().to_string(), "{}");
        assert!(matches!(
            tokio::time::timeout(WAIT, done_rx.recv()).await,
            Ok(Some(()))
        ));
        assert!(client.is_active("/topic/session/8/records"));
    }

    #[tokio::test]
    async fn negotiated_heartbeat_reaches_transport() {
        let (connector, mut peers) = MemoryConnector::channel();
        let client = StompClient::new(connector);
        let mut peer = open_peer(&client, &mut peers, options()).await;
        peer.open_socket();
        let _ = peer.next_frame().await;
        peer.send_frame(
            Frame::new(Command::Connected)
                .header("version", "1.2")
                .header("heart-beat", "15000,20000"),
        );
        assert!(wait_for_state(&client, ConnectionState::Connected).await);
        let timing = peer.heartbeat();
        assert_eq!(timing.send, Duration::from_secs(20));
        assert_eq!(timing.expect, Duration::from_secs(15));
        assert_eq!(timing.read_timeout(), Some(Duration::from_secs(30)));

        peer.drop_socket("half-open");
        assert!(wait_for_state(&client, ConnectionState::Connecting).await);
        assert_eq!(peer.heartbeat(), HeartbeatTiming::default());
    }
}
