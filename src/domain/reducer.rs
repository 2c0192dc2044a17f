//! Folds real-time events into locally held collections.
//!
//! The reducer never removes or reorders entries and never touches an
//! entity the event does not name. Unknown identifiers are a no-op.

use serde::Serialize;

use super::assignment::Assignment;
use super::event::RealtimeEvent;
use super::session::{AttendanceRecordUpdate, AttendanceSession};

/// Result of merging a newly announced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The entity was appended.
    Appended,
    /// An entity with the same id was already held; nothing changed.
    Duplicate,
}

/// Result of applying a record update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The student's status was updated.
    Patched,
    /// No held session matches the update.
    UnknownSession,
    /// The session is held but does not list the student.
    UnknownStudent,
}

/// Appends `session` unless a session with the same id is already held.
pub fn merge_session(sessions: &mut Vec<AttendanceSession>, session: AttendanceSession) -> MergeOutcome {
    if sessions.iter().any(|s| s.session_id == session.session_id) {
        return MergeOutcome::Duplicate;
    }
    sessions.push(session);
    MergeOutcome::Appended
}

/// Appends `assignment` unless one with the same id is already held.
pub fn merge_assignment(assignments: &mut Vec<Assignment>, assignment: Assignment) -> MergeOutcome {
    if assignments
        .iter()
        .any(|a| a.assignment_id == assignment.assignment_id)
    {
        return MergeOutcome::Duplicate;
    }
    assignments.push(assignment);
    MergeOutcome::Appended
}

/// Sets the status of the student named by `update` in the session it names.
///
/// Only that student's `status` changes. An update without a session id is
/// treated as referring to an unknown session.
pub fn apply_record_update(
    sessions: &mut [AttendanceSession],
    update: &AttendanceRecordUpdate,
) -> PatchOutcome {
    let Some(session) = update
        .session_id
        .and_then(|id| sessions.iter_mut().find(|s| s.session_id == id))
    else {
        return PatchOutcome::UnknownSession;
    };
    let Some(student) = session
        .students
        .iter_mut()
        .find(|s| s.student_id == update.student_id)
    else {
        return PatchOutcome::UnknownStudent;
    };
    student.status = update.status;
    PatchOutcome::Patched
}

/// What [`ClassroomState::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    /// Result of merging a session.
    Session(MergeOutcome),
    /// Result of merging an assignment.
    Assignment(MergeOutcome),
    /// Result of patching a record.
    Record(PatchOutcome),
}

impl ReduceOutcome {
    /// Returns `true` if the held state changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(
            self,
            Self::Session(MergeOutcome::Appended)
                | Self::Assignment(MergeOutcome::Appended)
                | Self::Record(PatchOutcome::Patched)
        )
    }
}

/// Sessions and assignments held for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomState {
    /// Attendance sessions, in arrival order.
    pub sessions: Vec<AttendanceSession>,
    /// Assignments, in arrival order.
    pub assignments: Vec<Assignment>,
}

impl ClassroomState {
    /// Creates a state seeded with fetched collections. Duplicate ids in the
    /// seed are collapsed to their first occurrence.
    #[must_use]
    pub fn seeded(sessions: Vec<AttendanceSession>, assignments: Vec<Assignment>) -> Self {
        let mut state = Self::default();
        for session in sessions {
            merge_session(&mut state.sessions, session);
        }
        for assignment in assignments {
            merge_assignment(&mut state.assignments, assignment);
        }
        state
    }

    /// Folds one event into the state.
    pub fn apply(&mut self, event: &RealtimeEvent) -> ReduceOutcome {
        match event {
            RealtimeEvent::SessionCreated(session) => {
                ReduceOutcome::Session(merge_session(&mut self.sessions, session.clone()))
            }
            RealtimeEvent::AssignmentCreated(assignment) => {
                ReduceOutcome::Assignment(merge_assignment(&mut self.assignments, assignment.clone()))
            }
            RealtimeEvent::RecordUpdated(update) => {
                ReduceOutcome::Record(apply_record_update(&mut self.sessions, update))
            }
        }
    }
}
