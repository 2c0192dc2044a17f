//! Destination naming shared with the backend publishers.
//!
//! Topic strings are the only correlation between a server-side publisher
//! and a client subscription, so both directions (format and parse) live
//! here and nowhere else.
//!
//! | Destination                             | Direction       | Payload                    |
//! |-----------------------------------------|-----------------|----------------------------|
//! | `/topic/class/{classSubjectId}/sessions`    | server → client | new attendance session |
//! | `/topic/class/{classSubjectId}/assignments` | server → client | new assignment         |
//! | `/topic/session/{sessionId}/records`        | server → client | attendance record change |
//! | `/app/session/{sessionId}/records`          | client → server | student check-in       |

use std::fmt;

use crate::domain::{ClassSubjectId, SessionId};

/// A server → client topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// New attendance sessions for a class-subject.
    ClassSessions(ClassSubjectId),
    /// New assignments for a class-subject.
    ClassAssignments(ClassSubjectId),
    /// Attendance record changes within one session.
    SessionRecords(SessionId),
}

impl Topic {
    /// Parses a destination string produced by [`Topic`]'s `Display`.
    ///
    /// Returns `None` for anything that is not one of the known topics.
    #[must_use]
    pub fn parse(destination: &str) -> Option<Self> {
        let rest = destination.strip_prefix("/topic/")?;
        let mut parts = rest.split('/');
        let (kind, id, leaf) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        match (kind, leaf) {
            ("class", "sessions") => id.parse().ok().map(Self::ClassSessions),
            ("class", "assignments") => id.parse().ok().map(Self::ClassAssignments),
            ("session", "records") => id.parse().ok().map(Self::SessionRecords),
            _ => None,
        }
    }

    /// Both topics a class-subject publishes on.
    #[must_use]
    pub const fn for_class_subject(id: ClassSubjectId) -> [Self; 2] {
        [Self::ClassSessions(id), Self::ClassAssignments(id)]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassSessions(id) => write!(f, "/topic/class/{id}/sessions"),
            Self::ClassAssignments(id) => write!(f, "/topic/class/{id}/assignments"),
            Self::SessionRecords(id) => write!(f, "/topic/session/{id}/records"),
        }
    }
}

/// A client → server application destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppDestination {
    /// Student check-in for one session.
    SessionRecords(SessionId),
}

impl fmt::Display for AppDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionRecords(id) => write!(f, "/app/session/{id}/records"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_backend_destinations() {
        let cs = ClassSubjectId::new(12);
        assert_eq!(Topic::ClassSessions(cs).to_string(), "/topic/class/12/sessions");
        assert_eq!(
            Topic::ClassAssignments(cs).to_string(),
            "/topic/class/12/assignments"
        );
        assert_eq!(
            Topic::SessionRecords(SessionId::new(5)).to_string(),
            "/topic/session/5/records"
        );
        assert_eq!(
            AppDestination::SessionRecords(SessionId::new(5)).to_string(),
            "/app/session/5/records"
        );
    }

    #[test]
    fn parse_inverts_display() {
        for topic in [
            Topic::ClassSessions(ClassSubjectId::new(1)),
            Topic::ClassAssignments(ClassSubjectId::new(2)),
            Topic::SessionRecords(SessionId::new(3)),
        ] {
            assert_eq!(Topic::parse(&topic.to_string()), Some(topic));
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(Topic::parse("/topic/class/x/sessions"), None);
        assert_eq!(Topic::parse("/topic/class/1/grades"), None);
        assert_eq!(Topic::parse("/topic/session/1/records/extra"), None);
        assert_eq!(Topic::parse("/app/session/1/records"), None);
        assert_eq!(Topic::parse(""), None);
    }

    #[test]
    fn class_subject_expands_to_two_topics() {
        let id = ClassSubjectId::new(4);
        assert_eq!(
            Topic::for_class_subject(id),
            [Topic::ClassSessions(id), Topic::ClassAssignments(id)]
        );
    }
}
