//! Type-safe entity identifiers.
//!
//! The backend identifies every entity by a numeric database key. Each kind
//! of key gets its own newtype so a session ID can never be passed where a
//! class-subject ID is expected, even though both are `u64` on the wire.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw numeric key.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw numeric key.
            #[must_use]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id! {
    /// One subject taught to one class in one term (class × subject × teacher × term).
    ClassSubjectId
}

entity_id! {
    /// One attendance-taking window for a class-subject.
    SessionId
}

entity_id! {
    /// A student enrolled in a class.
    StudentId
}

entity_id! {
    /// An assignment or exam published for a class-subject.
    AssignmentId
}

entity_id! {
    /// The logged-in user (teacher or student) owning a real-time session.
    UserId
}
