//! Caller-side handle on one subscription.

use std::fmt;

use super::connection::StompClient;
use super::registry::SubscriptionId;
use super::state::SubscriptionState;

/// Returned by [`StompClient::subscribe`].
///
/// The handle remembers the subscription id it was issued for. Once that
/// subscription is gone (explicit unsubscribe, `disconnect`, or a discarded
/// reconnect) the handle is inert, even if the destination is subscribed
/// again later under a new id.
#[derive(Clone)]
pub struct SubscriptionHandle {
    client: StompClient,
    destination: String,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub(crate) const fn new(client: StompClient, destination: String, id: SubscriptionId) -> Self {
        Self {
            client,
            destination,
            id,
        }
    }

    /// Destination this handle was issued for.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// STOMP subscription id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current state of this particular subscription.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        match self.client.lookup(&self.destination) {
            Some((id, state)) if id == self.id => state,
            _ => SubscriptionState::Unsubscribed,
        }
    }

    /// Cancels the subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.client.unsubscribe_if_current(&self.destination, self.id)
    }
}

impl PartialEq for SubscriptionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.destination == other.destination
    }
}

impl Eq for SubscriptionHandle {}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("destination", &self.destination)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
