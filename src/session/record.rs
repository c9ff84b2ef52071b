//! Session and member records
//!
//! A [`SessionRecord`] is the locally held copy of a lobby as reported by the
//! directory service. Construction validates the structural invariants
//! (member ids are unique, capacity is never below the member count) and the
//! mutators used by directory implementations keep them.

use crate::error::{Result, SessionError};
use crate::types::{Attributes, DataObject, LocalPlayer, MemberId, SessionId, Visibility, PLAYER_NAME_KEY};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// A member of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    id: MemberId,
    data: Attributes,
    joined: DateTime<Utc>,
}

impl MemberRecord {
    /// Create a member record; the display name attribute is required
    pub fn new(id: impl Into<MemberId>, data: Attributes) -> Result<Self> {
        let id = id.into();
        match data.get(PLAYER_NAME_KEY) {
            Some(name) if !name.value.trim().is_empty() => {}
            _ => {
                return Err(SessionError::InvalidRequest {
                    reason: format!("member {} is missing the {} attribute", id, PLAYER_NAME_KEY),
                }
                .into())
            }
        }

        Ok(Self {
            id,
            data,
            joined: current_timestamp(),
        })
    }

    /// Member record describing the local player
    pub fn for_player(player: &LocalPlayer) -> Result<Self> {
        Self::new(player.id.clone(), player.attributes())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Attributes {
        &self.data
    }

    pub fn joined(&self) -> DateTime<Utc> {
        self.joined
    }

    /// The member's display name
    pub fn display_name(&self) -> Option<&str> {
        self.data.get(PLAYER_NAME_KEY).map(|d| d.value.as_str())
    }

    /// Merge attributes into this member, keeping the name attribute non-empty
    pub fn merge_data(&mut self, data: Attributes) -> Result<()> {
        if let Some(name) = data.get(PLAYER_NAME_KEY) {
            if name.value.trim().is_empty() {
                return Err(SessionError::InvalidRequest {
                    reason: format!("{} cannot be empty", PLAYER_NAME_KEY),
                }
                .into());
            }
        }
        self.data.extend(data);
        Ok(())
    }

    fn public_view(&self) -> Self {
        Self {
            id: self.id.clone(),
            data: public_attributes(&self.data),
            joined: self.joined,
        }
    }
}

/// A lobby as reported by the directory service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    id: SessionId,
    name: String,
    join_code: String,
    host_id: MemberId,
    max_members: usize,
    is_private: bool,
    members: Vec<MemberRecord>,
    data: Attributes,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

/// Builder for [`SessionRecord`]; `build` validates the record
#[derive(Debug, Clone)]
pub struct SessionRecordBuilder {
    id: SessionId,
    name: String,
    max_members: usize,
    join_code: String,
    host_id: Option<MemberId>,
    is_private: bool,
    members: Vec<MemberRecord>,
    data: Attributes,
}

impl SessionRecordBuilder {
    pub fn join_code(mut self, code: impl Into<String>) -> Self {
        self.join_code = code.into();
        self
    }

    pub fn host(mut self, host_id: impl Into<MemberId>) -> Self {
        self.host_id = Some(host_id.into());
        self
    }

    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    pub fn member(mut self, member: MemberRecord) -> Self {
        self.members.push(member);
        self
    }

    pub fn data(mut self, data: Attributes) -> Self {
        self.data = data;
        self
    }

    /// Validate and build the record
    pub fn build(self) -> Result<SessionRecord> {
        if self.max_members < self.members.len() {
            return Err(SessionError::InvalidSession {
                reason: format!(
                    "session {} has {} members but capacity {}",
                    self.id,
                    self.members.len(),
                    self.max_members
                ),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(member.id()) {
                return Err(SessionError::InvalidSession {
                    reason: format!("duplicate member {} in session {}", member.id(), self.id),
                }
                .into());
            }
        }

        // The first member is host unless one was named
        let host_id = self
            .host_id
            .or_else(|| self.members.first().map(|m| m.id.clone()))
            .unwrap_or_default();

        let now = current_timestamp();
        Ok(SessionRecord {
            id: self.id,
            name: self.name,
            join_code: self.join_code,
            host_id,
            max_members: self.max_members,
            is_private: self.is_private,
            members: self.members,
            data: self.data,
            created: now,
            last_updated: now,
        })
    }
}

impl SessionRecord {
    /// Start building a record
    pub fn builder(id: impl Into<SessionId>, name: impl Into<String>, max_members: usize) -> SessionRecordBuilder {
        SessionRecordBuilder {
            id: id.into(),
            name: name.into(),
            max_members,
            join_code: String::new(),
            host_id: None,
            is_private: false,
            members: Vec::new(),
            data: Attributes::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    pub fn data(&self) -> &Attributes {
        &self.data
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn available_slots(&self) -> usize {
        self.max_members - self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members
    }

    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m.id == member_id)
    }

    pub fn is_host(&self, member_id: &str) -> bool {
        self.host_id == member_id
    }

    /// Look up a session attribute
    pub fn attribute(&self, key: &str) -> Result<&DataObject> {
        self.data.get(key).ok_or_else(|| {
            SessionError::NotFound {
                reason: format!("attribute {} not set on session {}", key, self.id),
            }
            .into()
        })
    }

    /// Look up a member by id
    pub fn member(&self, member_id: &str) -> Result<&MemberRecord> {
        self.members.iter().find(|m| m.id == member_id).ok_or_else(|| {
            SessionError::NotFound {
                reason: format!("member {} not in session {}", member_id, self.id),
            }
            .into()
        })
    }

    /// Add a member, enforcing capacity and id uniqueness
    pub fn add_member(&mut self, member: MemberRecord) -> Result<()> {
        if self.has_member(member.id()) {
            return Err(SessionError::Conflict {
                reason: format!("member {} already in session {}", member.id(), self.id),
            }
            .into());
        }
        if self.is_full() {
            return Err(SessionError::SessionFull {
                reason: format!("session {} is at capacity {}", self.id, self.max_members),
            }
            .into());
        }

        self.members.push(member);
        self.touch();
        Ok(())
    }

    /// Remove a member; the host moves to the next member when the host leaves
    pub fn remove_member(&mut self, member_id: &str) -> Option<MemberRecord> {
        let index = self.members.iter().position(|m| m.id == member_id)?;
        let removed = self.members.remove(index);

        if self.host_id == member_id {
            self.host_id = self
                .members
                .first()
                .map(|m| m.id.clone())
                .unwrap_or_default();
        }
        self.touch();
        Some(removed)
    }

    /// Mutable access to a member's record
    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut MemberRecord> {
        self.members.iter_mut().find(|m| m.id == member_id)
    }

    /// Hand the host role to an existing member
    pub fn set_host(&mut self, member_id: &str) -> Result<()> {
        if !self.has_member(member_id) {
            return Err(SessionError::NotFound {
                reason: format!("member {} not in session {}", member_id, self.id),
            }
            .into());
        }
        self.host_id = member_id.to_string();
        self.touch();
        Ok(())
    }

    /// Change capacity; never below the current member count
    pub fn set_max_members(&mut self, max_members: usize) -> Result<()> {
        if max_members < self.members.len() {
            return Err(SessionError::InvalidSession {
                reason: format!(
                    "capacity {} is below member count {}",
                    max_members,
                    self.members.len()
                ),
            }
            .into());
        }
        self.max_members = max_members;
        self.touch();
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_private(&mut self, is_private: bool) {
        self.is_private = is_private;
        self.touch();
    }

    /// Merge session attributes
    pub fn merge_data(&mut self, data: Attributes) {
        self.data.extend(data);
        self.touch();
    }

    /// Copy of the record with non-public attributes removed
    pub fn public_view(&self) -> SessionRecord {
        SessionRecord {
            data: public_attributes(&self.data),
            members: self.members.iter().map(MemberRecord::public_view).collect(),
            ..self.clone()
        }
    }

    fn touch(&mut self) {
        self.last_updated = current_timestamp();
    }
}

fn public_attributes(data: &Attributes) -> Attributes {
    data.iter()
        .filter(|(_, d)| d.visibility == Visibility::Public)
        .map(|(k, d)| (k.clone(), d.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::session_error;
    use proptest::prelude::*;

    fn member(id: &str) -> MemberRecord {
        MemberRecord::for_player(&LocalPlayer::new(id, format!("name-{}", id))).unwrap()
    }

    fn game_data() -> Attributes {
        let mut data = Attributes::new();
        data.insert("GameMode".to_string(), DataObject::public("CaptureTheFlag"));
        data.insert("Secret".to_string(), DataObject::member("hunter2"));
        data
    }

    #[test]
    fn test_member_requires_name() {
        let result = MemberRecord::new("p1", Attributes::new());
        let error = result.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::InvalidRequest { .. })
        ));

        let member = member("p1");
        assert_eq!(member.display_name(), Some("name-p1"));
    }

    #[test]
    fn test_build_rejects_capacity_below_members() {
        let result = SessionRecord::builder("s1", "Lobby", 1)
            .member(member("a"))
            .member(member("b"))
            .build();
        assert!(matches!(
            session_error(&result.unwrap_err()),
            Some(SessionError::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_build_rejects_duplicate_members() {
        let result = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .member(member("a"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_first_member_becomes_host() {
        let record = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .member(member("b"))
            .build()
            .unwrap();
        assert_eq!(record.host_id(), "a");
        assert_eq!(record.available_slots(), 2);
    }

    #[test]
    fn test_read_helpers() {
        let record = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .data(game_data())
            .build()
            .unwrap();

        assert_eq!(record.attribute("GameMode").unwrap().value, "CaptureTheFlag");
        assert!(matches!(
            session_error(&record.attribute("Map").unwrap_err()),
            Some(SessionError::NotFound { .. })
        ));
        assert_eq!(record.member("a").unwrap().id(), "a");
        assert!(record.member("zzz").is_err());
    }

    #[test]
    fn test_add_member_enforces_capacity_and_uniqueness() {
        let mut record = SessionRecord::builder("s1", "Lobby", 2)
            .member(member("a"))
            .build()
            .unwrap();

        let duplicate = record.add_member(member("a")).unwrap_err();
        assert!(matches!(
            session_error(&duplicate),
            Some(SessionError::Conflict { .. })
        ));

        record.add_member(member("b")).unwrap();
        let full = record.add_member(member("c")).unwrap_err();
        assert!(matches!(
            session_error(&full),
            Some(SessionError::SessionFull { .. })
        ));
        assert_eq!(record.members().len(), 2);
    }

    #[test]
    fn test_host_leaving_promotes_next_member() {
        let mut record = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .member(member("b"))
            .build()
            .unwrap();

        let removed = record.remove_member("a").unwrap();
        assert_eq!(removed.id(), "a");
        assert_eq!(record.host_id(), "b");
        assert!(record.remove_member("a").is_none());
    }

    #[test]
    fn test_set_host_requires_member() {
        let mut record = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .member(member("b"))
            .build()
            .unwrap();

        assert!(record.set_host("ghost").is_err());
        record.set_host("b").unwrap();
        assert!(record.is_host("b"));
    }

    #[test]
    fn test_public_view_strips_hidden_attributes() {
        let record = SessionRecord::builder("s1", "Lobby", 4)
            .member(member("a"))
            .data(game_data())
            .build()
            .unwrap();

        let view = record.public_view();
        assert!(view.attribute("GameMode").is_ok());
        assert!(view.attribute("Secret").is_err());
        // PlayerName has Member visibility
        assert!(view.members()[0].data().is_empty());
        assert_eq!(view.id(), record.id());
    }

    proptest! {
        #[test]
        fn prop_joins_never_exceed_capacity(capacity in 1usize..12, attempts in 0usize..30) {
            let mut record = SessionRecord::builder("s1", "Lobby", capacity).build().unwrap();
            for i in 0..attempts {
                let _ = record.add_member(member(&format!("p{}", i)));
                prop_assert!(record.members().len() <= capacity);
            }
            prop_assert_eq!(record.members().len(), attempts.min(capacity));
        }
    }
}
