//! Connection options and lifecycle callbacks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RealtimeError;
use crate::stomp::{ACCEPT_VERSION, Command, Frame, HeartBeat};

/// Called after `CONNECTED`, once pending subscriptions have been flushed.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;
/// Called for connection, protocol and decode failures.
pub type ErrorCallback = Arc<dyn Fn(RealtimeError) + Send + Sync>;
/// Called with the close reason when an established session drops.
pub type DisconnectCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// What happens to active subscriptions when the transport drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResubscribePolicy {
    /// Move them back to pending and replay them on the next `CONNECTED`.
    #[default]
    Replay,
    /// Forget them; callers re-subscribe from `on_connect`.
    Discard,
}

/// Settings for [`crate::client::StompClient::connect`].
#[derive(Clone)]
pub struct ConnectOptions {
    /// WebSocket URL of the STOMP endpoint.
    pub url: String,
    /// Optional `login` header.
    pub login: Option<String>,
    /// Optional `passcode` header.
    pub passcode: Option<String>,
    /// Extra `CONNECT` headers (e.g. an `Authorization` token).
    pub headers: Vec<(String, String)>,
    /// Heart-beats offered to the broker.
    pub heartbeat: HeartBeat,
    /// Fixed reconnect delay; zero disables reconnects.
    pub reconnect_delay: Duration,
    /// Handling of active subscriptions across reconnects.
    pub resubscribe: ResubscribePolicy,
    pub(crate) on_connect: Option<ConnectCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_disconnect: Option<DisconnectCallback>,
}

impl ConnectOptions {
    /// Default reconnect delay, matching the STOMP.js client default.
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);

    /// Creates options for `url` with 10 s heart-beats both ways and the
    /// default reconnect delay.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            login: None,
            passcode: None,
            headers: Vec::new(),
            heartbeat: HeartBeat::new(10_000, 10_000),
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            resubscribe: ResubscribePolicy::Replay,
            on_connect: None,
            on_error: None,
            on_disconnect: None,
        }
    }

    /// Sets `login` and `passcode`.
    #[must_use]
    pub fn with_credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }

    /// Adds a `CONNECT` header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the offered heart-beats.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartBeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the resubscribe policy.
    #[must_use]
    pub fn with_resubscribe(mut self, policy: ResubscribePolicy) -> Self {
        self.resubscribe = policy;
        self
    }

    /// Registers the `on_connect` callback.
    #[must_use]
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Registers the `on_error` callback.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(RealtimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Registers the `on_disconnect` callback.
    #[must_use]
    pub fn on_disconnect(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Builds the `CONNECT` frame sent on every socket open.
    #[must_use]
    pub fn connect_frame(&self) -> Frame {
        let mut frame = Frame::new(Command::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("heart-beat", self.heartbeat.to_string());
        if let Some(host) = host_of(&self.url) {
            frame = frame.header("host", host);
        }
        if let Some(login) = &self.login {
            frame = frame.header("login", login.as_str());
        }
        if let Some(passcode) = &self.passcode {
            frame = frame.header("passcode", passcode.as_str());
        }
        for (name, value) in &self.headers {
            frame = frame.header(name.as_str(), value.as_str());
        }
        frame
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("url", &self.url)
            .field("login", &self.login)
            .field("headers", &self.headers.len())
            .field("heartbeat", &self.heartbeat)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("resubscribe", &self.resubscribe)
            .finish_non_exhaustive()
    }
}

/// Host part of a URL, without scheme, port, path or credentials.
fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if authority.starts_with('[') {
        authority.split_once(']').map(|(h, _)| h.trim_start_matches('['))?
    } else {
        authority.split(':').next()?
    };
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_frame_carries_negotiation_headers() {
        let frame = ConnectOptions::new("ws://10.0.2.2:8080/ws-attendance")
            .with_credentials("teacher", "secret")
            .with_header("Authorization", "Bearer abc")
            .with_heartbeat(HeartBeat::new(4_000, 0))
            .connect_frame();
        assert_eq!(frame.command, Command::Connect);
        assert_eq!(frame.get("accept-version"), Some(ACCEPT_VERSION));
        assert_eq!(frame.get("heart-beat"), Some("4000,0"));
        assert_eq!(frame.get("host"), Some("10.0.2.2"));
        assert_eq!(frame.get("login"), Some("teacher"));
        assert_eq!(frame.get("passcode"), Some("secret"));
        assert_eq!(frame.get("Authorization"), Some("Bearer abc"));
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("wss://api.estude.vn/ws-attendance"), Some("api.estude.vn"));
        assert_eq!(host_of("ws://user:pw@localhost:8080"), Some("localhost"));
        assert_eq!(host_of("ws://[::1]:8080/ws"), Some("::1"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn defaults_follow_stompjs() {
        let opts = ConnectOptions::new("ws://x");
        assert_eq!(opts.reconnect_delay, Duration::from_secs(5));
        assert_eq!(opts.resubscribe, ResubscribePolicy::Replay);
        assert!(opts.on_connect.is_none());
    }
}
