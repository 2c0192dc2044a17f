//! STOMP 1.2 frame model and text codec.
//!
//! A frame on the wire is:
//!
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body^@
//! ```
//!
//! Every frame travels inside one WebSocket text message; a message may
//! carry several frames and heart-beat EOLs between them.

use std::fmt;
use std::str::FromStr;

/// Errors raised while decoding a frame received from the broker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The command line names no known STOMP command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A header line had no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    /// The frame ended before its header block was complete.
    #[error("truncated frame")]
    Truncated,

    /// No NUL octet terminated the frame body.
    #[error("missing NUL terminator")]
    MissingTerminator,

    /// A header contained an escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence: \\{0}")]
    InvalidEscape(char),

    /// The `content-length` header was not a valid body length.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
}

/// STOMP frame commands (client and server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client: open a session.
    Connect,
    /// Client: open a session (1.2 alias of `CONNECT`).
    Stomp,
    /// Server: session accepted.
    Connected,
    /// Client: publish to a destination.
    Send,
    /// Client: register interest in a destination.
    Subscribe,
    /// Client: drop a subscription.
    Unsubscribe,
    /// Client: acknowledge a message.
    Ack,
    /// Client: reject a message.
    Nack,
    /// Client: start a transaction.
    Begin,
    /// Client: commit a transaction.
    Commit,
    /// Client: roll back a transaction.
    Abort,
    /// Client: close the session.
    Disconnect,
    /// Server: message delivered to a subscription.
    Message,
    /// Server: receipt for a client frame.
    Receipt,
    /// Server: protocol or application error.
    Error,
}

impl Command {
    /// Returns the wire spelling of the command.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// `CONNECT` and `CONNECTED` frames carry unescaped headers.
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

/// A single STOMP frame.
///
/// Headers keep their wire order; repeated headers are allowed and
/// [`Frame::get`] returns the first occurrence as STOMP 1.2 requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Ordered header list.
    pub headers: Vec<(String, String)>,
    /// Text body (empty for most control frames).
    pub body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first value of the named header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the frame to its wire form, NUL terminator included.
    ///
    /// A `content-length` header is added for non-empty bodies unless the
    /// caller already set one.
    #[must_use]
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                push_escaped(&mut out, name);
                out.push(':');
                push_escaped(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Decodes every frame contained in one WebSocket text message.
///
/// Heart-beat EOLs before, between and after frames are skipped; a message
/// consisting only of EOLs yields an empty vector.
///
/// # Errors
///
/// Returns a [`FrameError`] if any frame in the message is malformed.
pub fn decode_all(text: &str) -> Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();
    let mut rest = skip_eols(text);
    while !rest.is_empty() {
        let (frame, tail) = decode_one(rest)?;
        frames.push(frame);
        rest = skip_eols(tail);
    }
    Ok(frames)
}

fn skip_eols(s: &str) -> &str {
    s.trim_start_matches(['\r', '\n'])
}

/// Splits off one line, stripping the `\n` or `\r\n` terminator.
fn take_line(s: &str) -> Result<(&str, &str), FrameError> {
    let (line, rest) = s.split_once('\n').ok_or(FrameError::Truncated)?;
    Ok((line.strip_suffix('\r').unwrap_or(line), rest))
}

fn decode_one(input: &str) -> Result<(Frame, &str), FrameError> {
    let (command_line, mut rest) = take_line(input)?;
    let command: Command = command_line.parse()?;
    let escaped = command.escapes_headers();

    let mut frame = Frame::new(command);
    loop {
        let (line, tail) = take_line(rest)?;
        rest = tail;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if escaped {
            frame.headers.push((unescape(name)?, unescape(value)?));
        } else {
            frame.headers.push((name.to_string(), value.to_string()));
        }
    }

    let (body, tail) = match frame.get("content-length") {
        Some(raw) => {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| FrameError::InvalidContentLength(raw.to_string()))?;
            let body = rest
                .get(..len)
                .ok_or_else(|| FrameError::InvalidContentLength(raw.to_string()))?;
            let tail = rest
                .get(len..)
                .and_then(|t| t.strip_prefix('\0'))
                .ok_or(FrameError::MissingTerminator)?;
            (body, tail)
        }
        None => rest.split_once('\0').ok_or(FrameError::MissingTerminator)?,
    };
    frame.body = body.to_string();
    Ok((frame, tail))
}

fn push_escaped(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(FrameError::InvalidEscape(other)),
            None => return Err(FrameError::InvalidEscape(' ')),
        }
    }
    Ok(out)
}
