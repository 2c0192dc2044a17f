//! SockJS framing for the `websocket` sub-transport.
//!
//! A SockJS endpoint at `{base}` serves raw WebSocket sessions at
//! `{base}/{server}/{session}/websocket`. Inside that socket the server
//! sends `o` once after opening, `h` as its own heart-beat, `a[...]` with a
//! JSON array of payloads, and `c[code,"reason"]` before closing. The client
//! writes JSON arrays of payloads.

use serde_json::Value;
use uuid::Uuid;

use crate::error::RealtimeError;

/// One SockJS frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    /// `o`: the session is open.
    Open,
    /// `h`: server heart-beat.
    Heartbeat,
    /// `a[...]`: payloads, each carrying zero or more STOMP frames.
    Messages(Vec<String>),
    /// `c[code,"reason"]`: the server is closing the session.
    Close {
        /// SockJS close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Session URL for a fresh connection to the SockJS endpoint at `base`.
///
/// The server id is three random digits and the session id a random token,
/// so every attempt gets its own session.
#[must_use]
pub fn session_url(base: &str) -> String {
    let id = Uuid::new_v4();
    let server = id.as_u128() % 1000;
    format!(
        "{}/{server:03}/{}/websocket",
        base.trim_end_matches('/'),
        id.simple()
    )
}

/// Wraps one payload for sending.
#[must_use]
pub fn encode(payload: &str) -> String {
    Value::Array(vec![Value::String(payload.to_string())]).to_string()
}

/// Decodes one SockJS frame.
///
/// # Errors
///
/// Returns [`RealtimeError::Connection`] for an unknown frame type or a
/// malformed array.
pub fn decode(text: &str) -> Result<SockJsFrame, RealtimeError> {
    let kind = text.get(..1).unwrap_or_default();
    let rest = text.get(1..).unwrap_or_default();
    match kind {
        "o" => Ok(SockJsFrame::Open),
        "h" => Ok(SockJsFrame::Heartbeat),
        "a" => serde_json::from_str::<Vec<String>>(rest)
            .map(SockJsFrame::Messages)
            .map_err(|err| malformed(text, &err)),
        "c" => serde_json::from_str::<(u16, String)>(rest)
            .map(|(code, reason)| SockJsFrame::Close { code, reason })
            .map_err(|err| malformed(text, &err)),
        _ => Err(RealtimeError::Connection(format!(
            "unknown SockJS frame: {text:?}"
        ))),
    }
}

fn malformed(text: &str, err: &serde_json::Error) -> RealtimeError {
    RealtimeError::Connection(format!("malformed SockJS frame {text:?}: {err}"))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn session_url_appends_server_and_session() {
        let url = session_url("ws://school.test/ws-attendance/");
        let Some(rest) = url.strip_prefix("ws://school.test/ws-attendance/") else {
            panic!("base must be kept: {url}");
        };
        let parts: Vec<&str> = rest.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first().map(|s| s.len()), Some(3));
        assert!(parts.first().is_some_and(|s| s.chars().all(|c| c.is_ascii_digit())));
        assert_eq!(parts.last(), Some(&"websocket"));
        assert_ne!(url, session_url("ws://school.test/ws-attendance"));
    }

    #[test]
    fn decodes_every_frame_type() {
        assert_eq!(decode("o").ok(), Some(SockJsFrame::Open));
        assert_eq!(decode("h").ok(), Some(SockJsFrame::Heartbeat));
        assert_eq!(
            decode(r#"a["CONNECTED\nversion:1.2\n\n\u0000","\n"]"#).ok(),
            Some(SockJsFrame::Messages(vec![
                "CONNECTED\nversion:1.2\n\n\0".to_string(),
                "\n".to_string(),
            ]))
        );
        assert_eq!(
            decode(r#"c[3000,"Go away!"]"#).ok(),
            Some(SockJsFrame::Close {
                code: 3000,
                reason: "Go away!".to_string(),
            })
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_frames() {
        assert!(decode("").is_err());
        assert!(decode("x").is_err());
        assert!(decode("a[1,2]").is_err());
        assert!(decode("c[]").is_err());
    }

    #[test]
    fn encode_escapes_frame_text() {
        let wire = encode("SEND\ndestination:/app/x\n\n{\"a\":1}\0");
        assert_eq!(
            wire,
            r#"["SEND\ndestination:/app/x\n\n{\"a\":1}\u0000"]"#
        );
        assert_eq!(
            decode(&format!("a{wire}")).ok(),
            Some(SockJsFrame::Messages(vec![
                "SEND\ndestination:/app/x\n\n{\"a\":1}\0".to_string()
            ]))
        );
    }
}
