//! Subscription registry owned by the STOMP client.
//!
//! Tracks, per destination, whether a subscription is queued for the next
//! `CONNECTED` or already active on the current connection. At most one
//! entry exists per destination, in either state.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::message::StompMessage;
use super::state::SubscriptionState;

/// Callback invoked for every message on a subscription.
pub type MessageHandler = Arc<dyn Fn(StompMessage) + Send + Sync>;

/// Client-assigned STOMP subscription id, rendered as `sub-N`.
///
/// Ids increase monotonically for the life of a client and are never
/// reused, so a handle from a torn-down subscription never matches a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("sub-")
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or(())
    }
}

/// One registered subscription, pending or active.
#[derive(Clone)]
pub struct Subscription {
    /// STOMP subscription id.
    pub id: SubscriptionId,
    /// Destination string.
    pub destination: String,
    /// Handler receiving parsed messages.
    pub handler: MessageHandler,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// Entries removed by [`SubscriptionRegistry::remove`].
#[derive(Debug, Default)]
pub struct Removed {
    /// The active entry, if the destination was active.
    pub active: Option<Subscription>,
    /// Whether a pending entry was purged.
    pub pending: bool,
}

/// Pending queue plus active map, keyed by destination.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    pending: VecDeque<Subscription>,
    active: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id and state of the entry for `destination`, if any.
    #[must_use]
    pub fn lookup(&self, destination: &str) -> Option<(SubscriptionId, SubscriptionState)> {
        if let Some(sub) = self.active.get(destination) {
            return Some((sub.id, SubscriptionState::Active));
        }
        self.pending
            .iter()
            .find(|s| s.destination == destination)
            .map(|s| (s.id, SubscriptionState::PendingSubscribe))
    }

    /// Returns the state of `destination`.
    #[must_use]
    pub fn state_of(&self, destination: &str) -> SubscriptionState {
        self.lookup(destination)
            .map_or(SubscriptionState::Unsubscribed, |(_, state)| state)
    }

    /// Returns `true` if `destination` is active.
    #[must_use]
    pub fn is_active(&self, destination: &str) -> bool {
        self.active.contains_key(destination)
    }

    /// Returns `true` if `destination` is queued.
    #[must_use]
    pub fn is_pending(&self, destination: &str) -> bool {
        self.pending.iter().any(|s| s.destination == destination)
    }

    /// Creates a new entry with a fresh id. The caller decides whether it is
    /// queued or activated.
    pub fn allocate(&mut self, destination: String, handler: MessageHandler) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        Subscription {
            id,
            destination,
            handler,
        }
    }

    /// Appends an entry to the pending queue.
    pub fn push_pending(&mut self, sub: Subscription) {
        self.pending.push_back(sub);
    }

    /// Records an entry as active.
    pub fn insert_active(&mut self, sub: Subscription) {
        self.active.insert(sub.destination.clone(), sub);
    }

    /// Empties the pending queue, returning entries in arrival order.
    pub fn drain_pending(&mut self) -> Vec<Subscription> {
        self.pending.drain(..).collect()
    }

    /// Moves every active entry back to the front of the pending queue,
    /// oldest subscription first, keeping its id.
    pub fn requeue_active(&mut self) -> usize {
        let mut revived: Vec<Subscription> = self.active.drain().map(|(_, s)| s).collect();
        revived.sort_by_key(|s| s.id);
        let count = revived.len();
        for sub in revived.into_iter().rev() {
            self.pending.push_front(sub);
        }
        count
    }

    /// Drops every active entry, keeping the pending queue.
    pub fn clear_active(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }

    /// Removes `destination` from both the active map and the pending queue.
    pub fn remove(&mut self, destination: &str) -> Removed {
        let active = self.active.remove(destination);
        let before = self.pending.len();
        self.pending.retain(|s| s.destination != destination);
        Removed {
            active,
            pending: self.pending.len() != before,
        }
    }

    /// Like [`Self::remove`], but only if the entry still carries `id`.
    pub fn remove_if_id(&mut self, destination: &str, id: SubscriptionId) -> Removed {
        match self.lookup(destination) {
            Some((current, _)) if current == id => self.remove(destination),
            _ => Removed::default(),
        }
    }

    /// Removes everything, returning the active entries.
    pub fn clear(&mut self) -> Vec<Subscription> {
        self.pending.clear();
        let mut active: Vec<Subscription> = self.active.drain().map(|(_, s)| s).collect();
        active.sort_by_key(|s| s.id);
        active
    }

    /// Finds the handler for a `subscription` header value.
    #[must_use]
    pub fn handler_for_id(&self, id: &str) -> Option<MessageHandler> {
        let id: SubscriptionId = id.parse().ok()?;
        self.active
            .values()
            .find(|s| s.id == id)
            .map(|s| Arc::clone(&s.handler))
    }

    /// Finds the handler for an active destination.
    #[must_use]
    pub fn handler_for_destination(&self, destination: &str) -> Option<MessageHandler> {
        self.active.get(destination).map(|s| Arc::clone(&s.handler))
    }

    /// Active destinations, oldest subscription first.
    #[must_use]
    pub fn active_destinations(&self) -> Vec<String> {
        let mut subs: Vec<&Subscription> = self.active.values().collect();
        subs.sort_by_key(|s| s.id);
        subs.into_iter().map(|s| s.destination.clone()).collect()
    }

    /// Pending destinations in queue order.
    #[must_use]
    pub fn pending_destinations(&self) -> Vec<String> {
        self.pending.iter().map(|s| s.destination.clone()).collect()
    }

    /// Total number of entries, active and pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len() + self.pending.len()
    }

    /// Returns `true` if no entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.pending.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn noop() -> MessageHandler {
        Arc::new(|_| {})
    }

    fn pending(reg: &mut SubscriptionRegistry, dest: &str) -> SubscriptionId {
        let sub = reg.allocate(dest.to_string(), noop());
        let id = sub.id;
        reg.push_pending(sub);
        id
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let reg = SubscriptionRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.state_of("/topic/a"), SubscriptionState::Unsubscribed);
    }

    #[test]
    fn ids_render_and_parse() {
        let mut reg = SubscriptionRegistry::new();
        let a = reg.allocate("/a".into(), noop());
        let b = reg.allocate("/b".into(), noop());
        assert_eq!(a.id.to_string(), "sub-0");
        assert_eq!(b.id.to_string(), "sub-1");
        assert_eq!("sub-1".parse::<SubscriptionId>(), Ok(b.id));
        assert!("1".parse::<SubscriptionId>().is_err());
    }

    #[test]
    fn drain_pending_keeps_arrival_order() {
        let mut reg = SubscriptionRegistry::new();
        pending(&mut reg, "/d1");
        pending(&mut reg, "/d2");
        let drained: Vec<String> = reg.drain_pending().into_iter().map(|s| s.destination).collect();
        assert_eq!(drained, vec!["/d1".to_string(), "/d2".to_string()]);
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_purges_pending_and_active() {
        let mut reg = SubscriptionRegistry::new();
        pending(&mut reg, "/p");
        let sub = reg.allocate("/a".into(), noop());
        reg.insert_active(sub);

        let removed = reg.remove("/p");
        assert!(removed.pending);
        assert!(removed.active.is_none());

        let removed = reg.remove("/a");
        assert!(removed.active.is_some());
        assert!(reg.is_empty());

        let removed = reg.remove("/unknown");
        assert!(!removed.pending && removed.active.is_none());
    }

    #[test]
    fn stale_id_does_not_remove_newer_entry() {
        let mut reg = SubscriptionRegistry::new();
        let old = pending(&mut reg, "/d");
        reg.remove("/d");
        let new = pending(&mut reg, "/d");
        assert_ne!(old, new);

        let removed = reg.remove_if_id("/d", old);
        assert!(!removed.pending);
        assert!(reg.is_pending("/d"));

        let removed = reg.remove_if_id("/d", new);
        assert!(removed.pending);
        assert!(!reg.is_pending("/d"));
    }

    #[test]
    fn requeue_puts_active_ahead_of_pending() {
        let mut reg = SubscriptionRegistry::new();
        for dest in ["/a1", "/a2"] {
            let sub = reg.allocate(dest.to_string(), noop());
            reg.insert_active(sub);
        }
        pending(&mut reg, "/p1");

        assert_eq!(reg.requeue_active(), 2);
        assert_eq!(
            reg.pending_destinations(),
            vec!["/a1".to_string(), "/a2".to_string(), "/p1".to_string()]
        );
        assert!(reg.active_destinations().is_empty());
    }

    #[test]
    fn handler_lookup_by_subscription_header() {
        let mut reg = SubscriptionRegistry::new();
        let sub = reg.allocate("/a".into(), noop());
        let id = sub.id.to_string();
        reg.insert_active(sub);
        assert!(reg.handler_for_id(&id).is_some());
        assert!(reg.handler_for_id("sub-99").is_none());
        assert!(reg.handler_for_id("garbage").is_none());
        assert!(reg.handler_for_destination("/a").is_some());
    }

    #[test]
    fn clear_returns_active_entries() {
        let mut reg = SubscriptionRegistry::new();
        let sub = reg.allocate("/a".into(), noop());
        reg.insert_active(sub);
        pending(&mut reg, "/p");
        assert_eq!(reg.len(), 2);
        let active = reg.clear();
        assert_eq!(active.len(), 1);
        assert!(reg.is_empty());
    }
}
