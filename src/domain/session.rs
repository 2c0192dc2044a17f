//! Attendance sessions and per-student attendance records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{ClassSubjectId, SessionId, StudentId};
use super::lenient;

/// Attendance status of one student in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// Student checked in on time.
    Present,
    /// Student checked in after the start time.
    Late,
    /// Student did not check in.
    Absent,
    /// Absence excused by the teacher.
    Excused,
    /// Missing, `null` or a status this client does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

impl AttendanceStatus {
    /// Returns the wire spelling (`"PRESENT"`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "PRESENT",
            Self::Late => "LATE",
            Self::Absent => "ABSENT",
            Self::Excused => "EXCUSED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// One student's row inside an [`AttendanceSession`].
///
/// Fields the client does not model are kept in `extra` so that a patched
/// record serializes back with everything the backend sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    /// Student identifier.
    pub student_id: StudentId,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// School-issued student code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_code: Option<String>,
    /// Current attendance status.
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: AttendanceStatus,
    /// Unmodelled backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StudentAttendance {
    /// Creates a record with only the identifier and status set.
    #[must_use]
    pub fn new(student_id: StudentId, status: AttendanceStatus) -> Self {
        Self {
            student_id,
            full_name: None,
            student_code: None,
            status,
            extra: Map::new(),
        }
    }
}

/// An attendance-taking window for a class-subject, as fetched over REST or
/// announced on `/topic/class/{id}/sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owning class-subject (absent in some payloads; the topic supplies it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_subject_id: Option<ClassSubjectId>,
    /// Human-readable session name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Start of the check-in window (backend local time).
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<NaiveDateTime>,
    /// End of the check-in window (backend local time).
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<NaiveDateTime>,
    /// Per-student records.
    #[serde(default)]
    pub students: Vec<StudentAttendance>,
    /// Unmodelled backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttendanceSession {
    /// Creates a session with no students and no optional metadata.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            class_subject_id: None,
            session_name: None,
            start_time: None,
            end_time: None,
            students: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Returns the record for `student_id`, if the student is listed.
    #[must_use]
    pub fn student(&self, student_id: StudentId) -> Option<&StudentAttendance> {
        self.students.iter().find(|s| s.student_id == student_id)
    }
}

/// Attendance record change published on `/topic/session/{id}/records` and
/// sent by students to `/app/session/{id}/records`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordUpdate {
    /// Session the record belongs to. Optional on the wire; the topic
    /// carries it as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Student whose record changed.
    pub student_id: StudentId,
    /// New status.
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: AttendanceStatus,
    /// `true` when a teacher made the change, `false` for student check-ins.
    #[serde(default)]
    pub by_teacher: bool,
    /// When the change was recorded (backend local time).
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<NaiveDateTime>,
}
