//! `heart-beat` header negotiation.

use std::fmt;
use std::time::Duration;

/// A `heart-beat:cx,cy` pair in milliseconds.
///
/// `outgoing` is how often the sender promises to emit heart-beats,
/// `incoming` how often it wants to receive them. Zero disables a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Promised send interval in milliseconds.
    pub outgoing_ms: u64,
    /// Requested receive interval in milliseconds.
    pub incoming_ms: u64,
}

impl HeartBeat {
    /// Creates a heart-beat setting.
    #[must_use]
    pub const fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parses a `heart-beat` header value. Malformed values mean "no heart-beats".
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(',').map(|p| p.trim().parse::<u64>().unwrap_or(0));
        let outgoing_ms = parts.next().unwrap_or(0);
        let incoming_ms = parts.next().unwrap_or(0);
        Self::new(outgoing_ms, incoming_ms)
    }

    /// Interval at which this client must send heart-beats, given the
    /// server's `CONNECTED` header. [`Duration::ZERO`] means none.
    #[must_use]
    pub fn negotiate_outgoing(&self, server: &Self) -> Duration {
        if self.outgoing_ms == 0 || server.incoming_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.outgoing_ms.max(server.incoming_ms))
    }

    /// Interval at which the server must send heart-beats, given its
    /// `CONNECTED` header. [`Duration::ZERO`] means nothing is expected.
    #[must_use]
    pub fn negotiate_incoming(&self, server: &Self) -> Duration {
        if self.incoming_ms == 0 || server.outgoing_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.incoming_ms.max(server.outgoing_ms))
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing_ms, self.incoming_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_header_format() {
        assert_eq!(HeartBeat::new(10_000, 5_000).to_string(), "10000,5000");
    }

    #[test]
    fn parse_tolerates_garbage() {
        assert_eq!(HeartBeat::parse("0,0"), HeartBeat::new(0, 0));
        assert_eq!(HeartBeat::parse(" 4000 , 2000"), HeartBeat::new(4000, 2000));
        assert_eq!(HeartBeat::parse("nope"), HeartBeat::default());
    }

    #[test]
    fn negotiation_takes_the_slower_side() {
        let client = HeartBeat::new(10_000, 10_000);
        assert_eq!(
            client.negotiate_outgoing(&HeartBeat::new(0, 20_000)),
            Duration::from_millis(20_000)
        );
        assert_eq!(
            client.negotiate_outgoing(&HeartBeat::new(0, 0)),
            Duration::ZERO
        );
        assert_eq!(
            HeartBeat::new(0, 0).negotiate_outgoing(&HeartBeat::new(0, 5_000)),
            Duration::ZERO
        );
    }

    #[test]
    fn incoming_needs_both_sides() {
        let client = HeartBeat::new(10_000, 10_000);
        assert_eq!(
            client.negotiate_incoming(&HeartBeat::new(4_000, 0)),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            client.negotiate_incoming(&HeartBeat::new(25_000, 0)),
            Duration::from_millis(25_000)
        );
        assert_eq!(client.negotiate_incoming(&HeartBeat::new(0, 5_000)), Duration::ZERO);
        assert_eq!(
            HeartBeat::new(10_000, 0).negotiate_incoming(&HeartBeat::new(4_000, 0)),
            Duration::ZERO
        );
    }
}
