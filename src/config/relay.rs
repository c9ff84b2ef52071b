//! Relay and admission configuration

use serde::{Deserialize, Serialize};

/// Settings for relay allocation and connection admission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Peers allowed on an allocation, excluding the host
    pub max_peers: usize,
    /// Relay endpoint type: udp, dtls or wss
    pub connection_type: String,
    /// Connections the host admits, itself included
    pub max_connections: usize,
    /// Region requested for allocations; the service picks when unset
    pub region: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_peers: 3,
            connection_type: "dtls".to_string(),
            max_connections: 4,
            region: None,
        }
    }
}
