//! Real-time events decoded from topic messages.

use super::assignment::Assignment;
use super::session::{AttendanceRecordUpdate, AttendanceSession};
use crate::client::StompMessage;
use crate::error::RealtimeError;
use crate::topic::Topic;

/// An inbound event, tagged by the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// A new attendance session for a class-subject.
    SessionCreated(AttendanceSession),
    /// A new assignment for a class-subject.
    AssignmentCreated(Assignment),
    /// An attendance record changed. `session_id` is always set.
    RecordUpdated(AttendanceRecordUpdate),
}

impl RealtimeEvent {
    /// Decodes `message` according to the topic it was delivered on.
    ///
    /// Identifiers the payload omits are filled in from the topic: the
    /// class-subject for sessions and assignments, the session for record
    /// updates. An explicit `sessionId` in a record update that disagrees
    /// with the topic is overridden by the topic.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if the body does not match
    /// the payload expected on `topic`.
    pub fn from_message(topic: Topic, message: &StompMessage) -> Result<Self, RealtimeError> {
        match topic {
            Topic::ClassSessions(class_subject) => {
                let mut session: AttendanceSession = message.decode()?;
                session.class_subject_id.get_or_insert(class_subject);
                Ok(Self::SessionCreated(session))
            }
            Topic::ClassAssignments(class_subject) => {
                let mut assignment: Assignment = message.decode()?;
                assignment.class_subject_id.get_or_insert(class_subject);
                Ok(Self::AssignmentCreated(assignment))
            }
            Topic::SessionRecords(session_id) => {
                let mut update: AttendanceRecordUpdate = message.decode()?;
                if update.session_id.is_some_and(|id| id != session_id) {
                    tracing::debug!(
                        topic = %topic,
                        payload = ?update.session_id,
                        "record update names another session; using topic"
                    );
                }
                update.session_id = Some(session_id);
                Ok(Self::RecordUpdated(update))
            }
        }
    }
}
