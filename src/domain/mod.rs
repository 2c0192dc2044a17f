//! Domain layer: entities mirrored from the backend, the events that
//! announce changes to them, and the reducer that folds events into held
//! state.

pub mod assignment;
pub mod event;
pub mod ids;
mod lenient;
pub mod reducer;
pub mod session;

pub use assignment::Assignment;
pub use event::RealtimeEvent;
pub use ids::{AssignmentId, ClassSubjectId, SessionId, StudentId, UserId};
pub use reducer::{ClassroomState, MergeOutcome, PatchOutcome, ReduceOutcome};
pub use session::{AttendanceRecordUpdate, AttendanceSession, AttendanceStatus, StudentAttendance};
