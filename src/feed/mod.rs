//! Per-user synchronisation context and its notification channel.

pub mod classroom;
pub mod notification;

pub use classroom::{ClassroomFeed, FeedSeed, Viewer};
pub use notification::{Notification, NotificationBus, NotificationKind};
