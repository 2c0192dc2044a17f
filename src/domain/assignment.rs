//! Assignments announced to a class-subject.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{AssignmentId, ClassSubjectId};
use super::lenient;

/// An assignment or exam, as fetched over REST or announced on
/// `/topic/class/{id}/assignments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assignment identifier.
    pub assignment_id: AssignmentId,
    /// Owning class-subject (absent in some payloads; the topic supplies it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_subject_id: Option<ClassSubjectId>,
    /// Title shown to students.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Submission deadline (backend local time).
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDateTime>,
    /// Unmodelled backend fields (description, question list, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Assignment {
    /// Creates an assignment with only its identifier set.
    #[must_use]
    pub fn new(assignment_id: AssignmentId) -> Self {
        Self {
            assignment_id,
            class_subject_id: None,
            title: None,
            due_date: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_payload() {
        let json = r#"{
            "assignmentId": 31,
            "title": "Quiz 2",
            "dueDate": "2025-04-10T23:59:00",
            "type": "QUIZ"
        }"#;
        let Ok(assignment) = serde_json::from_str::<Assignment>(json) else {
            panic!("assignment should deserialize");
        };
        assert_eq!(assignment.assignment_id, AssignmentId::new(31));
        assert_eq!(assignment.title.as_deref(), Some("Quiz 2"));
        assert!(assignment.due_date.is_some());
        assert_eq!(assignment.extra.get("type"), Some(&Value::from("QUIZ")));
    }

    #[test]
    fn zoned_due_date_is_accepted() {
        let json = r#"{"assignmentId": 32, "dueDate": "2025-04-10T16:59:00Z"}"#;
        let Ok(assignment) = serde_json::from_str::<Assignment>(json) else {
            panic!("assignment should deserialize");
        };
        assert_eq!(
            assignment.due_date.map(|d| d.to_string()).as_deref(),
            Some("2025-04-10 16:59:00")
        );
    }
}
