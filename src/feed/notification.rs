//! Toast notifications raised by the feed.
//!
//! [`NotificationBus`] wraps a [`tokio::sync::broadcast`] channel. The feed
//! publishes a [`Notification`] whenever something happened that the user
//! did not do themselves; any number of UI surfaces (or the monitor binary)
//! subscribe to show them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::SessionId;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone other than the teacher changed an attendance record.
    AttendanceMarked,
    /// A new attendance session opened for a watched class-subject.
    SessionOpened,
    /// A new assignment was posted for a watched class-subject.
    AssignmentPosted,
}

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique notification id.
    pub id: Uuid,
    /// Category.
    pub kind: NotificationKind,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Session concerned, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// When the feed raised it.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped now.
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches the session concerned.
    #[must_use]
    pub const fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Broadcast bus for [`Notification`]s.
///
/// When the ring buffer is full, the oldest notifications are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a bus holding up to `capacity` undelivered notifications
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a notification to all subscribers.
    ///
    /// Returns the number of receivers reached; with none, the notification
    /// is dropped.
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    /// Creates a receiver for all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Current number of receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
