//! Ties the signed-in user to the connection.
//!
//! A user becoming available connects the shared client and starts a fresh
//! [`ClassroomFeed`]; the user going away tears the feed down and then
//! disconnects. There is no subscription that outlives the user.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::client::{ConnectOptions, StompClient};
use crate::domain::UserId;
use crate::feed::{ClassroomFeed, FeedSeed, Notification, NotificationBus};

struct Active {
    user: UserId,
    feed: ClassroomFeed,
}

/// Connection lifecycle driven by the current user.
pub struct UserSession {
    client: StompClient,
    options: ConnectOptions,
    bus: NotificationBus,
    active: Mutex<Option<Active>>,
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("client", &self.client)
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

impl UserSession {
    /// Creates a session with no user. Nothing connects until
    /// [`Self::set_user`] receives one.
    #[must_use]
    pub fn new(client: StompClient, options: ConnectOptions, bus: NotificationBus) -> Self {
        Self {
            client,
            options,
            bus,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches to `user`.
    ///
    /// `Some` connects and starts a feed seeded with `seed`; the same user
    /// again is a no-op, a different user tears the previous one down first.
    /// `None` tears down and disconnects. Must be called from within a
    /// Tokio runtime.
    pub fn set_user(&self, user: Option<UserId>, seed: FeedSeed) {
        let mut active = self.lock();
        if let (Some(current), Some(next)) = (active.as_ref(), user)
            && current.user == next
        {
            tracing::debug!(user = %next, "user unchanged");
            return;
        }

        if let Some(previous) = active.take() {
            previous.feed.teardown();
            self.client.disconnect();
            tracing::info!(user = %previous.user, "user signed out");
        }

        let Some(user) = user else {
            self.client.disconnect();
            return;
        };

        self.client.connect(self.options.clone());
        let feed = ClassroomFeed::new(self.client.clone(), self.bus.clone());
        feed.start(seed);
        tracing::info!(%user, "user signed in");
        *active = Some(Active { user, feed });
    }

    /// Tears down and disconnects.
    pub fn shutdown(&self) {
        self.set_user(None, FeedSeed::default());
    }

    /// Current user, if any.
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.lock().as_ref().map(|a| a.user)
    }

    /// Feed of the current user, if any.
    #[must_use]
    pub fn feed(&self) -> Option<ClassroomFeed> {
        self.lock().as_ref().map(|a| a.feed.clone())
    }

    /// The shared client.
    #[must_use]
    pub const fn client(&self) -> &StompClient {
        &self.client
    }

    /// Receiver for notifications from any user's feed.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::ConnectionState;
    use crate::domain::ClassSubjectId;
    use crate::stomp::Command;
    use crate::transport::MemoryConnector;

    const WAIT: Duration = Duration::from_secs(2);

    fn session() -> (UserSession, tokio::sync::mpsc::UnboundedReceiver<crate::transport::MemoryPeer>) {
        let (connector, peers) = MemoryConnector::channel();
        let session = UserSession::new(
            StompClient::new(connector),
            ConnectOptions::new("ws://school.test/ws-attendance"),
            NotificationBus::default(),
        );
        (session, peers)
    }

    fn seed(class_subject: u64) -> FeedSeed {
        FeedSeed::with_class_subjects([ClassSubjectId::new(class_subject)])
    }

    #[tokio::test]
    async fn sign_in_connects_and_queues_class_topics() {
        let (session, mut peers) = session();
        session.set_user(Some(UserId::new(1)), seed(12));
        assert_eq!(session.user(), Some(UserId::new(1)));
        assert_eq!(session.client().state(), ConnectionState::Connecting);
        assert_eq!(
            session.client().pending_destinations(),
            vec!["/topic/class/12/sessions", "/topic/class/12/assignments"]
        );

        let Some(mut peer) = peers.recv().await else {
            panic!("no link opened");
        };
        let _ = peer.handshake().await;
        let mut state = session.client().state_changes();
        assert!(
            tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Connected))
                .await
                .is_ok_and(|r| r.is_ok())
        );
        let subscribes = peer
            .drain_frames()
            .into_iter()
            .filter(|f| f.command == Command::Subscribe)
            .count();
        assert_eq!(subscribes, 2);
    }

    #[tokio::test]
    async fn same_user_is_a_no_op() {
        let (session, mut peers) = session();
        session.set_user(Some(UserId::new(1)), seed(12));
        let Some(feed) = session.feed() else {
            panic!("feed missing");
        };
        session.set_user(Some(UserId::new(1)), seed(13));
        assert!(peers.recv().await.is_some());
        assert!(peers.try_recv().is_err());
        let Some(again) = session.feed() else {
            panic!("feed missing");
        };
        assert_eq!(feed.subscribed_destinations(), again.subscribed_destinations());
        assert!(!session.client().is_pending("/topic/class/13/sessions"));
    }

    #[tokio::test]
    async fn switching_users_starts_fresh() {
        let (session, mut peers) = session();
        session.set_user(Some(UserId::new(1)), seed(12));
        session.set_user(Some(UserId::new(2)), seed(13));
        assert!(peers.recv().await.is_some());
        assert!(peers.recv().await.is_some());
        assert_eq!(session.user(), Some(UserId::new(2)));
        assert_eq!(
            session.client().pending_destinations(),
            vec!["/topic/class/13/sessions", "/topic/class/13/assignments"]
        );
    }

    #[tokio::test]
    async fn sign_out_leaves_nothing_behind() {
        let (session, _peers) = session();
        session.set_user(Some(UserId::new(1)), seed(12));
        session.shutdown();
        assert_eq!(session.user(), None);
        assert!(session.feed().is_none());
        assert_eq!(session.client().state(), ConnectionState::Disconnected);
        assert_eq!(session.client().subscription_count(), 0);

        session.shutdown();
        assert_eq!(session.client().state(), ConnectionState::Disconnected);
    }
}
