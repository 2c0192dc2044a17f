//! WebSocket transport built on `tokio-tungstenite`.
//!
//! One task per link runs the connect loop: open the socket, pump frames in
//! both directions until it closes, then wait the fixed reconnect delay and
//! try again until the client closes the link.
//!
//! The socket either carries STOMP text directly or, for SockJS endpoints,
//! wrapped in SockJS frames (see [`super::sockjs`]).

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::sockjs::{self, SockJsFrame};
use super::{Connector, HeartbeatTiming, Link, LinkEnds, TransportEvent, TransportOptions};
use crate::error::RealtimeError;
use crate::stomp::{Frame, decode_all};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How STOMP text is carried inside the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// One STOMP payload per WebSocket text message.
    #[default]
    Raw,
    /// SockJS `websocket` sub-transport; the URL is the SockJS base URL.
    SockJs,
}

impl Framing {
    fn url(self, url: &str) -> String {
        match self {
            Self::Raw => url.to_string(),
            Self::SockJs => sockjs::session_url(url),
        }
    }

    fn wrap(self, payload: &str) -> String {
        match self {
            Self::Raw => payload.to_string(),
            Self::SockJs => sockjs::encode(payload),
        }
    }

    /// STOMP payloads carried by one inbound message, or the close reason.
    fn unpack(self, text: String) -> Result<Inbound, RealtimeError> {
        match self {
            Self::Raw => Ok(Inbound::Payloads(vec![text])),
            Self::SockJs => Ok(match sockjs::decode(&text)? {
                SockJsFrame::Open | SockJsFrame::Heartbeat => Inbound::Payloads(Vec::new()),
                SockJsFrame::Messages(payloads) => Inbound::Payloads(payloads),
                SockJsFrame::Close { code, reason } => Inbound::Close(format!("{code} {reason}")),
            }),
        }
    }
}

enum Inbound {
    Payloads(Vec<String>),
    Close(String),
}

/// Opens real WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector {
    framing: Framing,
}

impl WebSocketConnector {
    /// Creates a connector for plain STOMP-over-WebSocket endpoints.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            framing: Framing::Raw,
        }
    }

    /// Creates a connector for SockJS endpoints.
    #[must_use]
    pub const fn sockjs() -> Self {
        Self {
            framing: Framing::SockJs,
        }
    }

    /// Creates a connector with the given framing.
    #[must_use]
    pub const fn with_framing(framing: Framing) -> Self {
        Self { framing }
    }

    /// Framing this connector uses.
    #[must_use]
    pub const fn framing(&self) -> Framing {
        self.framing
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        options: &TransportOptions,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Link {
        let (link, ends) = Link::pair();
        tokio::spawn(run_transport(options.clone(), self.framing, events, ends));
        link
    }
}

/// Why a single socket's pump loop ended.
enum PumpExit {
    /// The client closed the link.
    Shutdown,
    /// The socket went away on its own.
    Closed(String),
}

async fn run_transport(
    options: TransportOptions,
    framing: Framing,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut ends: LinkEnds,
) {
    loop {
        if *ends.shutdown.borrow_and_update() {
            break;
        }

        let url = framing.url(&options.url);
        tracing::debug!(%url, ?framing, "opening websocket");
        let attempt = tokio::select! {
            res = connect_async(url.as_str()) => res,
            _ = ends.shutdown.changed() => break,
        };

        let reason = match attempt {
            Ok((stream, _response)) => {
                // Frames queued for a previous socket must not leak into this one.
                while ends.outbound.try_recv().is_ok() {}
                if events.send(TransportEvent::Opened).is_err() {
                    break;
                }
                match pump(stream, framing, &events, &mut ends).await {
                    PumpExit::Shutdown => break,
                    PumpExit::Closed(reason) => reason,
                }
            }
            Err(err) => {
                let _ = events.send(TransportEvent::Failed(RealtimeError::Connection(
                    err.to_string(),
                )));
                "connection failed".to_string()
            }
        };

        if events.send(TransportEvent::Closed { reason }).is_err() {
            break;
        }
        if options.reconnect_delay.is_zero() {
            break;
        }

        tracing::debug!(delay_ms = options.reconnect_delay.as_millis(), "reconnect scheduled");
        tokio::select! {
            () = tokio::time::sleep(options.reconnect_delay) => {}
            _ = ends.shutdown.changed() => break,
        }
    }

    tracing::debug!(url = %options.url, "websocket transport stopped");
}

/// Runs the read/write loop for one socket.
///
/// Every way of stopping at the client's request goes through
/// [`close_socket`], so frames queued just before `Link::close` (the
/// `UNSUBSCRIBE`s and `DISCONNECT` of a teardown) still reach the broker.
async fn pump(
    stream: WsStream,
    framing: Framing,
    events: &mpsc::UnboundedSender<TransportEvent>,
    ends: &mut LinkEnds,
) -> PumpExit {
    let (mut ws_tx, mut ws_rx) = stream.split();
    // Intervals belong to the STOMP session on this socket; start clean.
    let _ = ends.heartbeat.borrow_and_update();
    let mut timing = HeartbeatTiming::default();
    let mut ticker = heartbeat_ticker(timing.send);
    let mut last_read = Instant::now();

    loop {
        let deadline = timing.read_timeout().and_then(|t| last_read.checked_add(t));
        tokio::select! {
            biased;

            _ = ends.shutdown.changed() => {
                close_socket(&mut ws_tx, &mut ends.outbound, framing).await;
                return PumpExit::Shutdown;
            }
            // Frames from the broker
            msg = ws_rx.next() => {
                last_read = Instant::now();
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(err) => {
                            let _ = events.send(TransportEvent::Failed(
                                RealtimeError::Connection(format!("non-UTF-8 frame: {err}")),
                            ));
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpExit::Closed(reason);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return PumpExit::Closed(err.to_string()),
                    None => return PumpExit::Closed("stream ended".to_string()),
                };
                let payloads = match framing.unpack(text) {
                    Ok(Inbound::Payloads(payloads)) => payloads,
                    Ok(Inbound::Close(reason)) => {
                        let _ = ws_tx.close().await;
                        return PumpExit::Closed(reason);
                    }
                    Err(err) => {
                        let _ = events.send(TransportEvent::Failed(err));
                        continue;
                    }
                };
                for payload in payloads {
                    match decode_all(&payload) {
                        Ok(frames) => {
                            for frame in frames {
                                tracing::trace!(command = %frame.command, "frame received");
                                if events.send(TransportEvent::Frame(frame)).is_err() {
                                    close_socket(&mut ws_tx, &mut ends.outbound, framing).await;
                                    return PumpExit::Shutdown;
                                }
                            }
                        }
                        Err(err) => {
                            let _ = events.send(TransportEvent::Failed(err.into()));
                        }
                    }
                }
            }
            // Frames from the client
            frame = ends.outbound.recv() => {
                let Some(frame) = frame else {
                    close_socket(&mut ws_tx, &mut ends.outbound, framing).await;
                    return PumpExit::Shutdown;
                };
                tracing::trace!(command = %frame.command, "frame sent");
                if !write(&mut ws_tx, framing, &frame.encode()).await {
                    return PumpExit::Closed("send failed".to_string());
                }
            }
            changed = ends.heartbeat.changed() => {
                if changed.is_err() {
                    close_socket(&mut ws_tx, &mut ends.outbound, framing).await;
                    return PumpExit::Shutdown;
                }
                timing = *ends.heartbeat.borrow_and_update();
                ticker = heartbeat_ticker(timing.send);
                last_read = Instant::now();
            }
            _ = ticker.tick(), if !timing.send.is_zero() => {
                if !write(&mut ws_tx, framing, "\n").await {
                    return PumpExit::Closed("heart-beat send failed".to_string());
                }
            }
            () = sleep_until(deadline) => {
                tracing::warn!(
                    expected_ms = u64::try_from(timing.expect.as_millis()).unwrap_or(u64::MAX),
                    "no heart-beat from broker; dropping socket"
                );
                let _ = ws_tx.close().await;
                return PumpExit::Closed("heart-beat timeout".to_string());
            }
        }
    }
}

async fn write(ws_tx: &mut WsSink, framing: Framing, payload: &str) -> bool {
    ws_tx.send(Message::text(framing.wrap(payload))).await.is_ok()
}

/// Flushes frames queued before the link closed, then closes the socket.
async fn close_socket(
    ws_tx: &mut WsSink,
    outbound: &mut mpsc::UnboundedReceiver<Frame>,
    framing: Framing,
) {
    let mut flushed = 0usize;
    while let Ok(frame) = outbound.try_recv() {
        if !write(ws_tx, framing, &frame.encode()).await {
            break;
        }
        flushed += 1;
    }
    let _ = ws_tx.close().await;
    tracing::debug!(flushed, "websocket closed by client");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Interval for heart-beat EOLs. A zero period is never polled; it gets a
/// placeholder period because `tokio::time::interval` rejects zero.
fn heartbeat_ticker(period: Duration) -> tokio::time::Interval {
    let period = if period.is_zero() {
        Duration::from_secs(3600)
    } else {
        period
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
