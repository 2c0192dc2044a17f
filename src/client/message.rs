//! Inbound message representation.
//!
//! Bodies are JSON in practice, but the broker gives no guarantee, so a
//! body is either [`MessageBody::Parsed`] or [`MessageBody::Raw`] and
//! handlers match on it instead of guessing.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RealtimeError;
use crate::stomp::Frame;

/// Body of an inbound `MESSAGE` frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Body parsed as JSON.
    Parsed(Value),
    /// Body that was not valid JSON, passed through untouched.
    Raw(String),
}

impl MessageBody {
    /// Attempts a JSON parse, falling back to [`MessageBody::Raw`].
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Self::Parsed(value),
            Err(err) => {
                if !text.is_empty() {
                    tracing::warn!(error = %err, "message body is not JSON; passing raw text");
                }
                Self::Raw(text.to_string())
            }
        }
    }

    /// Returns the parsed JSON value, if any.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// A message delivered to a subscription handler.
#[derive(Debug, Clone, PartialEq)]
pub struct StompMessage {
    /// Destination the message was published on.
    pub destination: String,
    /// Client subscription id (`sub-N`) the broker routed it to.
    pub subscription_id: Option<String>,
    /// Broker-assigned message id.
    pub message_id: Option<String>,
    /// All frame headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Parsed or raw body.
    pub body: MessageBody,
}

impl StompMessage {
    /// Builds a message from a `MESSAGE` frame.
    #[must_use]
    pub fn from_frame(frame: Frame) -> Self {
        let destination = frame.get("destination").unwrap_or_default().to_string();
        let subscription_id = frame.get("subscription").map(str::to_string);
        let message_id = frame.get("message-id").map(str::to_string);
        let body = MessageBody::from_text(&frame.body);
        Self {
            destination,
            subscription_id,
            message_id,
            headers: frame.headers,
            body,
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if the body does not match
    /// `T`, including when it was not JSON at all.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RealtimeError> {
        let decoded = match &self.body {
            MessageBody::Parsed(value) => serde_json::from_value(value.clone())?,
            MessageBody::Raw(text) => serde_json::from_str(text)?,
        };
        Ok(decoded)
    }
}
