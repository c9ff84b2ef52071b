//! Common types used throughout the session orchestration layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of a session record, assigned by the lobby directory
pub type SessionId = String;

/// Identifier of a session member (the player's authenticated id)
pub type MemberId = String;

/// Identifier of a relay allocation
pub type AllocationId = Uuid;

/// Attribute key carrying a member's display name
pub const PLAYER_NAME_KEY: &str = "PlayerName";

/// Session attribute carrying the host's relay join code
pub const RELAY_JOIN_CODE_KEY: &str = "RelayJoinCode";

/// Who may read an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Visible to everyone and usable in query filters
    Public,
    /// Visible to members of the session
    Member,
    /// Visible to the owner only
    Private,
}

/// A single attribute value with its visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub visibility: Visibility,
    pub value: String,
}

impl DataObject {
    pub fn new(visibility: Visibility, value: impl Into<String>) -> Self {
        Self {
            visibility,
            value: value.into(),
        }
    }

    pub fn public(value: impl Into<String>) -> Self {
        Self::new(Visibility::Public, value)
    }

    pub fn member(value: impl Into<String>) -> Self {
        Self::new(Visibility::Member, value)
    }
}

/// Attribute map keyed by attribute name
pub type Attributes = BTreeMap<String, DataObject>;

/// Role of the local process in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionRole {
    Host,
    Member,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Host => write!(f, "host"),
            SessionRole::Member => write!(f, "member"),
        }
    }
}

/// The signed-in identity of this process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPlayer {
    pub id: MemberId,
    pub name: String,
}

impl LocalPlayer {
    pub fn new(id: impl Into<MemberId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Anonymous sign-in: a fresh id with the given display name
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name)
    }

    /// Attribute map describing this player to the directory
    pub fn attributes(&self) -> Attributes {
        let mut data = Attributes::new();
        data.insert(PLAYER_NAME_KEY.to_string(), DataObject::member(self.name.clone()));
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_players_are_distinct() {
        let a = LocalPlayer::anonymous("NiceGuy");
        let b = LocalPlayer::anonymous("NiceGuy");
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn test_player_attributes_carry_name() {
        let player = LocalPlayer::new("p1", "Alice");
        let data = player.attributes();
        assert_eq!(data.len(), 1);
        assert_eq!(data[PLAYER_NAME_KEY], DataObject::member("Alice"));
    }
}
