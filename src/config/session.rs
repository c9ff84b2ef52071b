//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the hosted or joined session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display name of the local player; a random suffix is added when empty
    pub player_name: String,
    /// Name used when hosting a session
    pub session_name: String,
    /// Capacity of hosted sessions
    pub max_members: usize,
    /// Hosted sessions are joinable by code only
    pub is_private: bool,
    /// Game mode attribute published on hosted sessions
    pub game_mode: String,
    /// Map attribute published on hosted sessions
    pub map: String,
    /// Heartbeat interval for hosted sessions
    pub heartbeat_interval_ms: u64,
    /// Poll interval for the joined session
    pub poll_interval_ms: u64,
    /// Result limit for session listings
    pub query_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            session_name: "Parlor".to_string(),
            max_members: 4,
            is_private: true,
            game_mode: "CaptureTheFlag".to_string(),
            map: "Default".to_string(),
            heartbeat_interval_ms: 15_000,
            poll_interval_ms: 1_500,
            query_count: 25,
        }
    }
}

impl SessionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
