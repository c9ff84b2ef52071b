//! Session record model and local session state
//!
//! This module holds the data shape of a lobby and its members, and the
//! process-local view of which session is hosted and which is joined.

pub mod record;
pub mod state;

// Re-export commonly used types
pub use record::{MemberRecord, SessionRecord, SessionRecordBuilder};
pub use state::{Cleared, LocalSessionState, PollApply};
