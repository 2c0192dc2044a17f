//! Client configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Unset or unparsable numeric values fall back to defaults.

use std::time::Duration;

use crate::client::{ConnectOptions, ResubscribePolicy};
use crate::domain::{ClassSubjectId, UserId};
use crate::error::RealtimeError;
use crate::feed::Viewer;
use crate::stomp::HeartBeat;
use crate::transport::{Framing, WebSocketConnector};

/// Top-level configuration.
///
/// Loaded once at startup via [`RealtimeConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Backend base URL (`http`, `https`, `ws` or `wss`).
    pub base_url: String,

    /// Path of the STOMP endpoint.
    pub ws_path: String,

    /// The endpoint is a SockJS endpoint; connect through its raw
    /// `websocket` sub-transport.
    pub sockjs: bool,

    /// Fixed delay between reconnect attempts (zero = no reconnect).
    pub reconnect_delay: Duration,

    /// Heart-beats offered to the broker.
    pub heartbeat: HeartBeat,

    /// Replay active subscriptions after a dropped connection.
    pub resubscribe_on_reconnect: bool,

    /// Capacity of the notification broadcast channel.
    pub notification_capacity: usize,

    /// User the monitor signs in as.
    pub user_id: Option<UserId>,

    /// Role of that user.
    pub viewer: Viewer,

    /// Class-subjects the monitor watches.
    pub class_subject_ids: Vec<ClassSubjectId>,

    /// Emit JSON logs instead of human-readable ones.
    pub log_json: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            ws_path: "/ws-attendance".to_string(),
            sockjs: false,
            reconnect_delay: ConnectOptions::DEFAULT_RECONNECT_DELAY,
            heartbeat: HeartBeat::new(10_000, 10_000),
            resubscribe_on_reconnect: true,
            notification_capacity: 256,
            user_id: None,
            viewer: Viewer::Teacher,
            class_subject_ids: Vec::new(),
            log_json: false,
        }
    }
}

impl RealtimeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] if `ESTUDE_BASE_URL` has an
    /// unsupported scheme, an ID is not a number or `ESTUDE_ROLE` is neither
    /// `teacher` nor `student`.
    pub fn from_env() -> Result<Self, RealtimeError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let base_url = std::env::var("ESTUDE_BASE_URL").unwrap_or(defaults.base_url);
        let ws_path = std::env::var("ESTUDE_WS_PATH").unwrap_or(defaults.ws_path);
        let sockjs = parse_env_bool("ESTUDE_SOCKJS", defaults.sockjs);

        let reconnect_delay = Duration::from_millis(parse_env(
            "ESTUDE_RECONNECT_DELAY_MS",
            duration_ms(defaults.reconnect_delay),
        ));
        let heartbeat = HeartBeat::new(
            parse_env("ESTUDE_HEARTBEAT_OUTGOING_MS", defaults.heartbeat.outgoing_ms),
            parse_env("ESTUDE_HEARTBEAT_INCOMING_MS", defaults.heartbeat.incoming_ms),
        );
        let resubscribe_on_reconnect =
            parse_env_bool("ESTUDE_RESUBSCRIBE_ON_RECONNECT", defaults.resubscribe_on_reconnect);
        let notification_capacity =
            parse_env("ESTUDE_NOTIFICATION_CAPACITY", defaults.notification_capacity);

        let user_id = std::env::var("ESTUDE_USER_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.parse()
                    .map_err(|_| RealtimeError::InvalidConfig(format!("ESTUDE_USER_ID: {v:?}")))
            })
            .transpose()?;
        let viewer = match std::env::var("ESTUDE_ROLE") {
            Ok(raw) => parse_viewer(&raw)?,
            Err(_) => defaults.viewer,
        };
        let class_subject_ids = parse_id_list(
            &std::env::var("ESTUDE_CLASS_SUBJECT_IDS").unwrap_or_default(),
        )?;

        let log_json = parse_env_bool("ESTUDE_LOG_JSON", defaults.log_json);

        let config = Self {
            base_url,
            ws_path,
            sockjs,
            reconnect_delay,
            heartbeat,
            resubscribe_on_reconnect,
            notification_capacity,
            user_id,
            viewer,
            class_subject_ids,
            log_json,
        };
        config.ws_url()?;
        Ok(config)
    }

    /// WebSocket URL of the STOMP endpoint: base URL plus path, with
    /// `http` mapped to `ws` and `https` to `wss`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] for any other scheme.
    pub fn ws_url(&self) -> Result<String, RealtimeError> {
        let base = self.base_url.trim_end_matches('/');
        let Some((scheme, rest)) = base.split_once("://") else {
            return Err(RealtimeError::InvalidConfig(format!(
                "base URL has no scheme: {base}"
            )));
        };
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(RealtimeError::InvalidConfig(format!(
                    "unsupported URL scheme: {other}"
                )));
            }
        };
        let path = self.ws_path.trim_start_matches('/');
        Ok(format!("{scheme}://{rest}/{path}"))
    }

    /// Connector matching the endpoint type.
    ///
    /// For SockJS endpoints [`Self::ws_url`] is the SockJS base URL; the
    /// connector appends a fresh `/{server}/{session}/websocket` per attempt.
    #[must_use]
    pub const fn connector(&self) -> WebSocketConnector {
        WebSocketConnector::with_framing(if self.sockjs {
            Framing::SockJs
        } else {
            Framing::Raw
        })
    }

    /// Connection options derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] if the URL cannot be derived.
    pub fn connect_options(&self) -> Result<ConnectOptions, RealtimeError> {
        let resubscribe = if self.resubscribe_on_reconnect {
            ResubscribePolicy::Replay
        } else {
            ResubscribePolicy::Discard
        };
        Ok(ConnectOptions::new(self.ws_url()?)
            .with_heartbeat(self.heartbeat)
            .with_reconnect_delay(self.reconnect_delay)
            .with_resubscribe(resubscribe))
    }
}

fn parse_viewer(raw: &str) -> Result<Viewer, RealtimeError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "teacher" => Ok(Viewer::Teacher),
        "student" => Ok(Viewer::Student),
        other => Err(RealtimeError::InvalidConfig(format!(
            "ESTUDE_ROLE must be teacher or student, got {other:?}"
        ))),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Parses a comma-separated list of IDs, ignoring blanks.
fn parse_id_list(raw: &str) -> Result<Vec<ClassSubjectId>, RealtimeError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| RealtimeError::InvalidConfig(format!("not a class-subject id: {s:?}")))
        })
        .collect()
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref()).unwrap_or(default)
}

fn parse_bool(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => Some(true),
        Some("false" | "0") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn with_base(base: &str) -> RealtimeConfig {
        RealtimeConfig {
            base_url: base.to_string(),
            ..RealtimeConfig::default()
        }
    }

    #[test]
    fn ws_url_maps_schemes() {
        assert_eq!(
            with_base("http://10.0.2.2:8080").ws_url().ok().as_deref(),
            Some("ws://10.0.2.2:8080/ws-attendance")
        );
        assert_eq!(
            with_base("https://api.estude.vn/").ws_url().ok().as_deref(),
            Some("wss://api.estude.vn/ws-attendance")
        );
        assert_eq!(
            with_base("wss://api.estude.vn").ws_url().ok().as_deref(),
            Some("wss://api.estude.vn/ws-attendance")
        );
    }

    #[test]
    fn ws_url_rejects_other_schemes() {
        let Err(err) = with_base("ftp://example.com").ws_url() else {
            panic!("ftp must be rejected");
        };
        assert_eq!(err.error_code(), 1001);
        assert!(with_base("localhost:8080").ws_url().is_err());
    }

    #[test]
    fn connect_options_follow_config() {
        let config = RealtimeConfig {
            resubscribe_on_reconnect: false,
            reconnect_delay: Duration::ZERO,
            ..RealtimeConfig::default()
        };
        let Ok(opts) = config.connect_options() else {
            panic!("default config must be valid");
        };
        assert_eq!(opts.url, "ws://localhost:8080/ws-attendance");
        assert_eq!(opts.resubscribe, ResubscribePolicy::Discard);
        assert!(opts.reconnect_delay.is_zero());
        assert_eq!(opts.heartbeat, HeartBeat::new(10_000, 10_000));
    }

    #[test]
    fn id_list_parsing() {
        let ids = tokio_test::assert_ok!(parse_id_list(" 12, 13 ,,"));
        assert_eq!(ids, vec![ClassSubjectId::new(12), ClassSubjectId::new(13)]);
        assert!(tokio_test::assert_ok!(parse_id_list("")).is_empty());
        let err = tokio_test::assert_err!(parse_id_list("12,abc"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn sockjs_flag_selects_framing() {
        assert_eq!(RealtimeConfig::default().connector().framing(), Framing::Raw);
        let config = RealtimeConfig {
            sockjs: true,
            ..RealtimeConfig::default()
        };
        assert_eq!(config.connector().framing(), Framing::SockJs);
        assert_eq!(
            config.ws_url().ok().as_deref(),
            Some("ws://localhost:8080/ws-attendance")
        );
    }

    #[test]
    fn role_parsing() {
        assert_eq!(tokio_test::assert_ok!(parse_viewer("Student")), Viewer::Student);
        assert_eq!(tokio_test::assert_ok!(parse_viewer(" teacher ")), Viewer::Teacher);
        assert_eq!(tokio_test::assert_ok!(parse_viewer("")), Viewer::Teacher);
        let err = tokio_test::assert_err!(parse_viewer("parent"));
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool(Some("TRUE")), Some(true));
        assert_eq!(parse_bool(Some(" 0 ")), Some(false));
        assert_eq!(parse_bool(Some("yes")), None);
        assert_eq!(parse_bool(None), None);
    }
}
