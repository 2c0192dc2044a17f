//! Keeps one user's subscriptions in step with the entities they can see.
//!
//! A [`ClassroomFeed`] is seeded with fetched class-subjects, sessions and
//! assignments. It subscribes each class-subject's `sessions` and
//! `assignments` topics and each session's `records` topic exactly once,
//! folds inbound events into its [`ClassroomState`], follows newly announced
//! sessions onto their `records` topic, and raises toasts for changes the
//! viewer did not make themselves.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::notification::{Notification, NotificationBus, NotificationKind};
use crate::client::{PublishOutcome, StompClient, StompMessage, SubscriptionHandle};
use crate::domain::{
    Assignment, AttendanceRecordUpdate, AttendanceSession, ClassSubjectId, ClassroomState,
    PatchOutcome, RealtimeEvent, ReduceOutcome, SessionId,
};
use crate::topic::{AppDestination, Topic};

/// Whose screen a feed serves.
///
/// Teachers create sessions and assignments and correct records; students
/// check in. A change made by the viewer's own role raises no toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    /// Sees student check-ins.
    #[default]
    Teacher,
    /// Sees new sessions, new assignments and teacher corrections.
    Student,
}

impl Viewer {
    /// Returns `true` if a change with this `by_teacher` flag came from
    /// the viewer's own role.
    #[must_use]
    pub const fn made(self, by_teacher: bool) -> bool {
        match self {
            Self::Teacher => by_teacher,
            Self::Student => !by_teacher,
        }
    }
}

/// Entities fetched before the feed starts.
#[derive(Debug, Clone, Default)]
pub struct FeedSeed {
    /// Role of the signed-in user.
    pub viewer: Viewer,
    /// Class-subjects the user teaches or attends.
    pub class_subjects: Vec<ClassSubjectId>,
    /// Known attendance sessions.
    pub sessions: Vec<AttendanceSession>,
    /// Known assignments.
    pub assignments: Vec<Assignment>,
}

impl FeedSeed {
    /// Seed with class-subjects only.
    #[must_use]
    pub fn with_class_subjects(class_subjects: impl IntoIterator<Item = ClassSubjectId>) -> Self {
        Self {
            class_subjects: class_subjects.into_iter().collect(),
            ..Self::default()
        }
    }
}

struct FeedShared {
    viewer: Viewer,
    state: ClassroomState,
    subscribed: BTreeMap<String, SubscriptionHandle>,
    closed: bool,
}

struct FeedInner {
    client: StompClient,
    bus: NotificationBus,
    shared: Mutex<FeedShared>,
}

/// Real-time synchronisation context for one user.
///
/// Cheap to clone. Message handlers hold only a weak reference, so dropping
/// every clone stops event processing even if `teardown` was never called.
#[derive(Clone)]
pub struct ClassroomFeed {
    inner: Arc<FeedInner>,
}

impl fmt::Debug for ClassroomFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("ClassroomFeed")
            .field("sessions", &shared.state.sessions.len())
            .field("assignments", &shared.state.assignments.len())
            .field("subscribed", &shared.subscribed.len())
            .field("closed", &shared.closed)
            .finish_non_exhaustive()
    }
}

impl ClassroomFeed {
    /// Creates an idle feed that subscribes through `client` and raises
    /// toasts on `bus`.
    #[must_use]
    pub fn new(client: StompClient, bus: NotificationBus) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                client,
                bus,
                shared: Mutex::new(FeedShared {
                    viewer: Viewer::default(),
                    state: ClassroomState::default(),
                    subscribed: BTreeMap::new(),
                    closed: false,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedShared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the held state with `seed` and subscribes every topic it
    /// implies.
    pub fn start(&self, seed: FeedSeed) {
        let FeedSeed {
            viewer,
            class_subjects,
            sessions,
            assignments,
        } = seed;
        let session_ids = {
            let mut shared = self.lock();
            shared.closed = false;
            shared.viewer = viewer;
            shared.state = ClassroomState::seeded(sessions, assignments);
            shared
                .state
                .sessions
                .iter()
                .map(|s| s.session_id)
                .collect::<Vec<_>>()
        };

        for id in &class_subjects {
            self.watch_class_subject(*id);
        }
        for id in session_ids {
            self.watch_session(id);
        }
        tracing::info!(
            ?viewer,
            class_subjects = class_subjects.len(),
            subscribed = self.lock().subscribed.len(),
            "classroom feed started"
        );
    }

    /// Subscribes the class-subject's `sessions` and `assignments` topics.
    /// Returns how many were newly subscribed.
    pub fn watch_class_subject(&self, id: ClassSubjectId) -> usize {
        Topic::for_class_subject(id)
            .into_iter()
            .filter(|topic| self.watch(*topic))
            .count()
    }

    /// Subscribes the session's `records` topic. Returns `false` if it was
    /// already subscribed or the feed is torn down.
    pub fn watch_session(&self, id: SessionId) -> bool {
        self.watch(Topic::SessionRecords(id))
    }

    fn watch(&self, topic: Topic) -> bool {
        let destination = topic.to_string();
        let mut shared = self.lock();
        if shared.closed || shared.subscribed.contains_key(&destination) {
            return false;
        }
        let weak: Weak<FeedInner> = Arc::downgrade(&self.inner);
        let handle = self.inner.client.subscribe(destination.clone(), move |message| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.on_message(topic, &message);
            }
        });
        shared.subscribed.insert(destination, handle);
        true
    }

    fn on_message(&self, topic: Topic, message: &StompMessage) {
        let event = match RealtimeEvent::from_message(topic, message) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(destination = %topic, error = %err, "undecodable event ignored");
                return;
            }
        };
        let _ = self.apply(&event);
    }

    /// Folds `event` into the held state and performs its follow-ups:
    /// watching a new session's records and raising toasts.
    ///
    /// Returns `None` once the feed has been torn down.
    pub fn apply(&self, event: &RealtimeEvent) -> Option<ReduceOutcome> {
        let (outcome, toast) = {
            let mut shared = self.lock();
            if shared.closed {
                tracing::debug!("event after teardown ignored");
                return None;
            }
            let outcome = shared.state.apply(event);
            let toast = notification_for(shared.viewer, &shared.state, event, outcome);
            (outcome, toast)
        };

        match (event, outcome) {
            (RealtimeEvent::SessionCreated(session), _) => {
                self.watch_session(session.session_id);
            }
            (RealtimeEvent::RecordUpdated(update), ReduceOutcome::Record(patch))
                if patch != PatchOutcome::Patched =>
            {
                tracing::debug!(
                    session = ?update.session_id,
                    student = %update.student_id,
                    ?patch,
                    "record update for unknown entity ignored"
                );
            }
            _ => {}
        }

        if let Some(toast) = toast {
            let reached = self.inner.bus.publish(toast);
            tracing::debug!(reached, "notification raised");
        }
        Some(outcome)
    }

    /// Publishes a student check-in for `session_id`.
    pub fn report_attendance(
        &self,
        session_id: SessionId,
        record: &AttendanceRecordUpdate,
    ) -> PublishOutcome {
        let mut record = record.clone();
        record.session_id = Some(session_id);
        let destination = AppDestination::SessionRecords(session_id).to_string();
        self.inner.client.publish(&destination, &record)
    }

    /// Unsubscribes every destination this feed subscribed and stops
    /// processing events. Returns how many subscriptions were released.
    pub fn teardown(&self) -> usize {
        let handles = {
            let mut shared = self.lock();
            shared.closed = true;
            std::mem::take(&mut shared.subscribed)
        };
        let released = handles.values().filter(|h| h.unsubscribe()).count();
        tracing::info!(released, "classroom feed torn down");
        released
    }

    /// Copy of the held state.
    #[must_use]
    pub fn snapshot(&self) -> ClassroomState {
        self.lock().state.clone()
    }

    /// Destinations this feed has subscribed, sorted.
    #[must_use]
    pub fn subscribed_destinations(&self) -> Vec<String> {
        self.lock().subscribed.keys().cloned().collect()
    }

    /// Receiver for this feed's notifications.
    #[must_use]
    pub fn notifications(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.inner.bus.subscribe()
    }
}

/// Toast for an event that changed state, if `viewer` did not cause it.
/// Sessions and assignments are always posted by teachers.
fn notification_for(
    viewer: Viewer,
    state: &ClassroomState,
    event: &RealtimeEvent,
    outcome: ReduceOutcome,
) -> Option<Notification> {
    if !outcome.changed() {
        return None;
    }
    match event {
        RealtimeEvent::RecordUpdated(update) if !viewer.made(update.by_teacher) => {
            let session_id = update.session_id?;
            let name = state
                .sessions
                .iter()
                .find(|s| s.session_id == session_id)
                .and_then(|s| s.student(update.student_id))
                .and_then(|s| s.full_name.clone())
                .unwrap_or_else(|| format!("Student {}", update.student_id));
            Some(
                Notification::new(
                    NotificationKind::AttendanceMarked,
                    "Attendance updated",
                    format!("{name} is now {}", update.status.as_str()),
                )
                .for_session(session_id),
            )
        }
        RealtimeEvent::RecordUpdated(_) => None,
        RealtimeEvent::SessionCreated(_) | RealtimeEvent::AssignmentCreated(_)
            if viewer.made(true) =>
        {
            None
        }
        RealtimeEvent::SessionCreated(session) => {
            let name = session
                .session_name
                .clone()
                .unwrap_or_else(|| format!("Session {}", session.session_id));
            Some(
                Notification::new(
                    NotificationKind::SessionOpened,
                    "Attendance session opened",
                    name,
                )
                .for_session(session.session_id),
            )
        }
        RealtimeEvent::AssignmentCreated(assignment) => Some(Notification::new(
            NotificationKind::AssignmentPosted,
            "New assignment",
            assignment
                .title
                .clone()
                .unwrap_or_else(|| format!("Assignment {}", assignment.assignment_id)),
        )),
    }
}
