//! Client error types with stable numeric codes.
//!
//! [`RealtimeError`] is the central error type for the crate. Runtime
//! failures (dropped sockets, broker `ERROR` frames) are never returned to
//! callers directly; they are handed to the `on_error` callback registered
//! in [`crate::client::ConnectOptions`]. Callers that want a serializable
//! form use [`RealtimeError::descriptor`].

use serde::Serialize;

use crate::stomp::FrameError;

/// Serializable error descriptor passed along with connection failures.
///
/// ```json
/// {
///   "code": 3001,
///   "message": "broker error: subscription rejected",
///   "details": "destination /topic/class/7/sessions is not allowed"
/// }
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorDescriptor {
    /// Numeric error code (see code ranges on [`RealtimeError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details (e.g. the body of a broker `ERROR` frame).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Client-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category                 |
/// |-----------|--------------------------|
/// | 1000–1999 | Configuration/validation |
/// | 2000–2999 | Connection               |
/// | 3000–3999 | Protocol / framing       |
/// | 4000–4999 | Payload                  |
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Configuration value was missing or unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The WebSocket handshake or the socket itself failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The broker answered with an `ERROR` frame.
    #[error("broker error: {message}")]
    Protocol {
        /// Value of the `message` header.
        message: String,
        /// Frame body, if the broker sent one.
        details: Option<String>,
    },

    /// A frame received from the broker could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A message body could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::Connection(_) => 2001,
            Self::Protocol { .. } => 3001,
            Self::Frame(_) => 3002,
            Self::Serialization(_) => 4001,
        }
    }

    /// Returns `true` for errors raised by the broker or the wire format
    /// rather than the socket.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::Frame(_))
    }

    /// Builds the serializable descriptor for this error.
    #[must_use]
    pub fn descriptor(&self) -> ErrorDescriptor {
        let details = match self {
            Self::Protocol { details, .. } => details.clone(),
            _ => None,
        };
        ErrorDescriptor {
            code: self.error_code(),
            message: self.to_string(),
            details,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_their_ranges() {
        assert_eq!(RealtimeError::InvalidConfig("x".into()).error_code() / 1000, 1);
        assert_eq!(RealtimeError::Connection("x".into()).error_code() / 1000, 2);
        assert_eq!(RealtimeError::Frame(FrameError::MissingTerminator).error_code() / 1000, 3);
    }

    #[test]
    fn protocol_descriptor_carries_details() {
        let err = RealtimeError::Protocol {
            message: "subscription rejected".to_string(),
            details: Some("not allowed".to_string()),
        };
        assert!(err.is_protocol());
        let desc = err.descriptor();
        assert_eq!(desc.code, 3001);
        assert_eq!(desc.message, "broker error: subscription rejected");
        assert_eq!(desc.details.as_deref(), Some("not allowed"));
    }

    #[test]
    fn descriptor_omits_empty_details() {
        let desc = RealtimeError::Connection("refused".into()).descriptor();
        let json = serde_json::to_string(&desc).unwrap_or_default();
        assert!(!json.contains("details"));
        assert!(json.contains("2001"));
    }
}
