//! Locally cached session state
//!
//! Holds at most one hosted and one joined record. Every mutation bumps a
//! revision counter so that a poll issued before a mutating operation can be
//! recognised as stale when it completes.

use crate::session::record::SessionRecord;
use serde::Serialize;

/// Outcome of applying a poll result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollApply {
    /// The joined record was replaced
    Applied,
    /// State moved on since the poll was issued; result discarded
    Stale,
}

/// What was cleared by [`LocalSessionState::clear_session`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cleared {
    pub joined: bool,
    pub hosted: bool,
}

/// Hosted and joined session references for this process
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalSessionState {
    hosted: Option<SessionRecord>,
    joined: Option<SessionRecord>,
    revision: u64,
}

impl LocalSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hosted(&self) -> Option<&SessionRecord> {
        self.hosted.as_ref()
    }

    pub fn joined(&self) -> Option<&SessionRecord> {
        self.joined.as_ref()
    }

    pub fn hosted_id(&self) -> Option<&str> {
        self.hosted.as_ref().map(|s| s.id())
    }

    pub fn joined_id(&self) -> Option<&str> {
        self.joined.as_ref().map(|s| s.id())
    }

    pub fn is_hosting(&self) -> bool {
        self.hosted.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.hosted.is_none() && self.joined.is_none()
    }

    /// Monotonic counter bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record a freshly created session: hosted and joined
    pub fn host_session(&mut self, record: SessionRecord) {
        self.hosted = Some(record.clone());
        self.joined = Some(record);
        self.bump();
    }

    /// Record a joined session
    pub fn join_session(&mut self, record: SessionRecord) {
        if self.hosted_id() == Some(record.id()) {
            self.hosted = Some(record.clone());
        }
        self.joined = Some(record);
        self.bump();
    }

    /// Replace whichever references point at this record's session
    pub fn replace(&mut self, record: SessionRecord) -> bool {
        let mut replaced = false;
        if self.hosted_id() == Some(record.id()) {
            self.hosted = Some(record.clone());
            replaced = true;
        }
        if self.joined_id() == Some(record.id()) {
            self.joined = Some(record);
            replaced = true;
        }
        if replaced {
            self.bump();
        }
        replaced
    }

    /// Take the host role for this record (it must be the joined session)
    pub fn promote_to_host(&mut self, record: SessionRecord) {
        self.hosted = Some(record.clone());
        self.joined = Some(record);
        self.bump();
    }

    /// Drop the hosted reference but stay joined
    pub fn release_host(&mut self, record: SessionRecord) {
        self.hosted = None;
        self.joined = Some(record);
        self.bump();
    }

    /// Apply a poll result issued at `observed_revision`
    pub fn apply_poll(&mut self, observed_revision: u64, record: SessionRecord) -> PollApply {
        if observed_revision != self.revision || self.joined_id() != Some(record.id()) {
            return PollApply::Stale;
        }
        self.replace(record);
        PollApply::Applied
    }

    /// Clear references to a session
    pub fn clear_session(&mut self, session_id: &str) -> Cleared {
        let mut cleared = Cleared::default();
        if self.joined_id() == Some(session_id) {
            self.joined = None;
            cleared.joined = true;
        }
        if self.hosted_id() == Some(session_id) {
            self.hosted = None;
            cleared.hosted = true;
        }
        if cleared.joined || cleared.hosted {
            self.bump();
        }
        cleared
    }

    /// Clear everything
    pub fn clear(&mut self) {
        self.hosted = None;
        self.joined = None;
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::record::MemberRecord;
    use crate::types::LocalPlayer;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::builder(id, "Lobby", 4)
            .member(MemberRecord::for_player(&LocalPlayer::new("host", "Host")).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let state = LocalSessionState::new();
        assert!(state.is_empty());
        assert_eq!(state.revision(), 0);
    }

    #[test]
    fn test_host_session_sets_both() {
        let mut state = LocalSessionState::new();
        state.host_session(record("s1"));
        assert_eq!(state.hosted_id(), Some("s1"));
        assert_eq!(state.joined_id(), Some("s1"));
        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_join_leaves_hosted_untouched() {
        let mut state = LocalSessionState::new();
        state.join_session(record("s1"));
        assert!(!state.is_hosting());
        assert_eq!(state.joined_id(), Some("s1"));
    }

    #[test]
    fn test_stale_poll_is_discarded() {
        let mut state = LocalSessionState::new();
        state.host_session(record("s1"));
        let observed = state.revision();

        // A mutating operation completes while the poll is in flight
        state.replace(record("s1"));
        assert_eq!(state.apply_poll(observed, record("s1")), PollApply::Stale);

        let observed = state.revision();
        assert_eq!(state.apply_poll(observed, record("s1")), PollApply::Applied);
    }

    #[test]
    fn test_poll_for_other_session_is_stale() {
        let mut state = LocalSessionState::new();
        state.join_session(record("s1"));
        let observed = state.revision();
        assert_eq!(state.apply_poll(observed, record("s2")), PollApply::Stale);
    }

    #[test]
    fn test_clear_session() {
        let mut state = LocalSessionState::new();
        state.host_session(record("s1"));

        let cleared = state.clear_session("other");
        assert_eq!(cleared, Cleared::default());

        let cleared = state.clear_session("s1");
        assert!(cleared.joined && cleared.hosted);
        assert!(state.is_empty());
    }

    #[test]
    fn test_release_host() {
        let mut state = LocalSessionState::new();
        state.host_session(record("s1"));
        state.release_host(record("s1"));
        assert!(!state.is_hosting());
        assert_eq!(state.joined_id(), Some("s1"));
    }
}
