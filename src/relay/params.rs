//! Relay connection parameters
//!
//! [`RelayConnectionParams`] is what the transport needs to reach the relay:
//! the chosen endpoint plus the per-peer credentials. It is built from a
//! fresh allocation, handed to the transport by value, and never cached.

use crate::error::{Result, SessionError};
use crate::relay::service::{Allocation, JoinAllocation, RelayEndpoint};
use crate::types::AllocationId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relay endpoint protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Udp,
    Dtls,
    Wss,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Udp => "udp",
            ConnectionType::Dtls => "dtls",
            ConnectionType::Wss => "wss",
        }
    }

    /// Whether the endpoint encrypts traffic
    pub fn is_secure(&self) -> bool {
        !matches!(self, ConnectionType::Udp)
    }
}

impl Default for ConnectionType {
    fn default() -> Self {
        ConnectionType::Dtls
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "udp" => Ok(ConnectionType::Udp),
            "dtls" => Ok(ConnectionType::Dtls),
            "wss" => Ok(ConnectionType::Wss),
            other => Err(SessionError::ConfigurationError {
                message: format!("unknown relay connection type '{}'", other),
            }
            .into()),
        }
    }
}

/// Which side of the relay this process is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayRole {
    Host,
    Client,
}

impl fmt::Display for RelayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayRole::Host => f.write_str("host"),
            RelayRole::Client => f.write_str("client"),
        }
    }
}

/// Transport-ready relay credentials
#[derive(Clone, PartialEq, Eq)]
pub struct RelayServerData {
    pub endpoint: RelayEndpoint,
    pub allocation_id_bytes: Vec<u8>,
    pub connection_data: Vec<u8>,
    /// The host's connection data; equal to `connection_data` on the host
    pub host_connection_data: Vec<u8>,
    pub key: Vec<u8>,
}

impl RelayServerData {
    /// Credentials for the host of an allocation
    pub fn from_allocation(allocation: &Allocation, connection_type: ConnectionType) -> Result<Self> {
        let endpoint = select_endpoint(&allocation.endpoints, connection_type)?;
        Ok(Self {
            endpoint,
            allocation_id_bytes: allocation.allocation_id_bytes.clone(),
            connection_data: allocation.connection_data.clone(),
            host_connection_data: allocation.connection_data.clone(),
            key: allocation.key.clone(),
        })
    }

    /// Credentials for a client joining an allocation
    pub fn from_join_allocation(
        allocation: &JoinAllocation,
        connection_type: ConnectionType,
    ) -> Result<Self> {
        let endpoint = select_endpoint(&allocation.endpoints, connection_type)?;
        Ok(Self {
            endpoint,
            allocation_id_bytes: allocation.allocation_id_bytes.clone(),
            connection_data: allocation.connection_data.clone(),
            host_connection_data: allocation.host_connection_data.clone(),
            key: allocation.key.clone(),
        })
    }

    pub fn is_secure(&self) -> bool {
        self.endpoint.connection_type.is_secure()
    }
}

impl fmt::Debug for RelayServerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayServerData")
            .field("endpoint", &self.endpoint)
            .field("allocation_id_bytes", &self.allocation_id_bytes.len())
            .field("connection_data", &self.connection_data.len())
            .field("host_connection_data", &self.host_connection_data.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

fn select_endpoint(endpoints: &[RelayEndpoint], connection_type: ConnectionType) -> Result<RelayEndpoint> {
    endpoints
        .iter()
        .find(|e| e.connection_type == connection_type)
        .cloned()
        .ok_or_else(|| {
            SessionError::InvalidRequest {
                reason: format!("allocation has no {} endpoint", connection_type),
            }
            .into()
        })
}

/// Everything the transport needs to join the relay as host or client
///
/// Consumed by [`crate::transport::Transport::set_connection_params`].
#[derive(Debug)]
pub struct RelayConnectionParams {
    allocation_id: AllocationId,
    join_code: String,
    role: RelayRole,
    region: String,
    server_data: RelayServerData,
}

impl RelayConnectionParams {
    pub fn new(
        allocation_id: AllocationId,
        join_code: impl Into<String>,
        role: RelayRole,
        region: impl Into<String>,
        server_data: RelayServerData,
    ) -> Self {
        Self {
            allocation_id,
            join_code: join_code.into(),
            role,
            region: region.into(),
            server_data,
        }
    }

    pub fn allocation_id(&self) -> AllocationId {
        self.allocation_id
    }

    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    pub fn role(&self) -> RelayRole {
        self.role
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn server_data(&self) -> &RelayServerData {
        &self.server_data
    }
}
