//! Utility functions for the session orchestration layer

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Characters used in human-shareable join codes (no 0/O or 1/I)
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated join codes
pub const JOIN_CODE_LENGTH: usize = 6;

/// Generate a new unique session ID
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a new unique allocation ID
pub fn generate_allocation_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a short human-shareable join code
pub fn generate_join_code() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(JOIN_CODE_LENGTH)
        .map(|b| JOIN_CODE_ALPHABET[*b as usize % JOIN_CODE_ALPHABET.len()] as char)
        .collect()
}

/// Generate opaque random bytes for relay credentials
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len);
    while bytes.len() < len {
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    }
    bytes.truncate(len);
    bytes
}

/// Display name for a player who did not pick one, e.g. `NiceGuy4821`
pub fn default_player_name() -> String {
    let suffix = Uuid::new_v4().as_u128() % 10_000;
    format!("NiceGuy{:04}", suffix)
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        assert_ne!(generate_session_id(), generate_session_id());
        assert_ne!(generate_allocation_id(), generate_allocation_id());
    }

    #[test]
    fn test_join_code_shape() {
        let code = generate_join_code();
        assert_eq!(code.len(), JOIN_CODE_LENGTH);
        assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_random_bytes_length() {
        assert_eq!(random_bytes(0).len(), 0);
        assert_eq!(random_bytes(16).len(), 16);
        assert_eq!(random_bytes(64).len(), 64);
    }

    #[test]
    fn test_default_player_name() {
        let name = default_player_name();
        assert!(name.starts_with("NiceGuy"));
        assert_eq!(name.len(), "NiceGuy".len() + 4);
    }
}
