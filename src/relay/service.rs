//! Relay allocation service interface and in-memory implementation

use crate::error::{ServiceError, ServiceReason, ServiceResult};
use crate::relay::params::ConnectionType;
use crate::types::AllocationId;
use crate::utils::{generate_allocation_id, generate_join_code, random_bytes};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Largest peer count an allocation accepts
pub const MAX_RELAY_PEERS: usize = 100;

/// A relay server address for one protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayEndpoint {
    pub connection_type: ConnectionType,
    pub host: String,
    pub port: u16,
}

impl RelayEndpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A relay slot reserved for a host
#[derive(Debug, Clone)]
pub struct Allocation {
    pub allocation_id: AllocationId,
    pub allocation_id_bytes: Vec<u8>,
    pub connection_data: Vec<u8>,
    pub key: Vec<u8>,
    pub endpoints: Vec<RelayEndpoint>,
    pub region: String,
}

/// A client's slot on a host's allocation
#[derive(Debug, Clone)]
pub struct JoinAllocation {
    pub allocation_id: AllocationId,
    pub allocation_id_bytes: Vec<u8>,
    pub connection_data: Vec<u8>,
    pub host_connection_data: Vec<u8>,
    pub key: Vec<u8>,
    pub endpoints: Vec<RelayEndpoint>,
    pub region: String,
}

/// Remote relay allocation service
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Reserve a relay slot for a host and up to `max_peers` clients
    async fn create_allocation(
        &self,
        max_peers: usize,
        region: Option<&str>,
    ) -> ServiceResult<Allocation>;

    /// Join code clients use to reach an allocation
    async fn get_join_code(&self, allocation_id: AllocationId) -> ServiceResult<String>;

    /// Resolve a join code into a client slot
    async fn join_allocation(&self, join_code: &str) -> ServiceResult<JoinAllocation>;
}

#[derive(Debug, Clone)]
struct AllocationEntry {
    max_peers: usize,
    clients: usize,
    join_code: Option<String>,
    host_connection_data: Vec<u8>,
    region: String,
}

#[derive(Debug, Default)]
struct RelayStore {
    allocations: HashMap<AllocationId, AllocationEntry>,
    codes: HashMap<String, AllocationId>,
}

/// In-memory relay service for tests and the sandbox
///
/// Allocations are kept until [`InMemoryRelayService::release`] is called;
/// there is no idle reclamation, so a long-running process that allocates
/// repeatedly grows the store. The broker's `disconnect` does not release
/// anything because the [`RelayService`] trait has no release call.
#[derive(Clone)]
pub struct InMemoryRelayService {
    store: Arc<RwLock<RelayStore>>,
    endpoint_types: Vec<ConnectionType>,
    default_region: String,
}

impl InMemoryRelayService {
    pub fn new() -> Self {
        Self::with_endpoints(vec![
            ConnectionType::Udp,
            ConnectionType::Dtls,
            ConnectionType::Wss,
        ])
    }

    /// Offer only the given endpoint types on allocations
    pub fn with_endpoints(endpoint_types: Vec<ConnectionType>) -> Self {
        Self {
            store: Arc::new(RwLock::new(RelayStore::default())),
            endpoint_types,
            default_region: "local".to_string(),
        }
    }

    /// Drop an allocation and its join code
    pub fn release(&self, allocation_id: AllocationId) -> bool {
        let Ok(mut store) = self.store.write() else {
            return false;
        };
        match store.allocations.remove(&allocation_id) {
            Some(entry) => {
                if let Some(code) = entry.join_code {
                    store.codes.remove(&code);
                }
                true
            }
            None => false,
        }
    }

    pub fn allocation_count(&self) -> usize {
        self.store.read().map(|s| s.allocations.len()).unwrap_or(0)
    }

    fn endpoints(&self) -> Vec<RelayEndpoint> {
        self.endpoint_types
            .iter()
            .map(|connection_type| RelayEndpoint {
                connection_type: *connection_type,
                host: "127.0.0.1".to_string(),
                port: match connection_type {
                    ConnectionType::Udp => 7777,
                    ConnectionType::Dtls => 7778,
                    ConnectionType::Wss => 443,
                },
            })
            .collect()
    }

    fn write(&self) -> ServiceResult<std::sync::RwLockWriteGuard<'_, RelayStore>> {
        self.store
            .write()
            .map_err(|_| ServiceError::unavailable("relay store lock poisoned"))
    }
}

impl Default for InMemoryRelayService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayService for InMemoryRelayService {
    async fn create_allocation(
        &self,
        max_peers: usize,
        region: Option<&str>,
    ) -> ServiceResult<Allocation> {
        if max_peers == 0 || max_peers > MAX_RELAY_PEERS {
            return Err(ServiceError::invalid_argument(format!(
                "max peers must be between 1 and {}",
                MAX_RELAY_PEERS
            )));
        }

        let allocation_id = generate_allocation_id();
        let region = region.unwrap_or(self.default_region.as_str()).to_string();
        let connection_data = random_bytes(16);

        self.write()?.allocations.insert(
            allocation_id,
            AllocationEntry {
                max_peers,
                clients: 0,
                join_code: None,
                host_connection_data: connection_data.clone(),
                region: region.clone(),
            },
        );
        info!(
            "Created relay allocation {} for {} peers in {}",
            allocation_id, max_peers, region
        );

        Ok(Allocation {
            allocation_id,
            allocation_id_bytes: allocation_id.as_bytes().to_vec(),
            connection_data,
            key: random_bytes(64),
            endpoints: self.endpoints(),
            region,
        })
    }

    async fn get_join_code(&self, allocation_id: AllocationId) -> ServiceResult<String> {
        let mut store = self.write()?;
        let existing = store
            .allocations
            .get(&allocation_id)
            .ok_or_else(|| {
                ServiceError::not_found(format!("allocation {} not found", allocation_id))
            })?
            .join_code
            .clone();
        if let Some(code) = existing {
            return Ok(code);
        }

        let mut code = generate_join_code();
        while store.codes.contains_key(&code) {
            code = generate_join_code();
        }
        store.codes.insert(code.clone(), allocation_id);
        if let Some(entry) = store.allocations.get_mut(&allocation_id) {
            entry.join_code = Some(code.clone());
        }

        debug!("Join code {} issued for allocation {}", code, allocation_id);
        Ok(code)
    }

    async fn join_allocation(&self, join_code: &str) -> ServiceResult<JoinAllocation> {
        let code = join_code.trim().to_uppercase();
        let mut store = self.write()?;

        let allocation_id = *store.codes.get(&code).ok_or_else(|| {
            ServiceError::new(
                ServiceReason::InvalidJoinCode,
                format!("join code {} not found", code),
            )
        })?;
        let entry = store
            .allocations
            .get_mut(&allocation_id)
            .ok_or_else(|| ServiceError::not_found(format!("allocation {} expired", allocation_id)))?;

        if entry.clients >= entry.max_peers {
            return Err(ServiceError::new(
                ServiceReason::SessionFull,
                format!("allocation {} has no free peer slots", allocation_id),
            ));
        }
        entry.clients += 1;

        Ok(JoinAllocation {
            allocation_id,
            allocation_id_bytes: allocation_id.as_bytes().to_vec(),
            connection_data: random_bytes(16),
            host_connection_data: entry.host_connection_data.clone(),
            key: random_bytes(64),
            endpoints: self.endpoints(),
            region: entry.region.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allocate_and_join() {
        let relay = InMemoryRelayService::new();
        let allocation = relay.create_allocation(3, None).await.unwrap();
        assert_eq!(allocation.region, "local");
        assert_eq!(allocation.endpoints.len(), 3);

        let code = relay.get_join_code(allocation.allocation_id).await.unwrap();
        assert_eq!(relay.get_join_code(allocation.allocation_id).await.unwrap(), code);

        let joined = relay.join_allocation(&code.to_lowercase()).await.unwrap();
        assert_eq!(joined.allocation_id, allocation.allocation_id);
        assert_eq!(joined.host_connection_data, allocation.connection_data);
    }

    #[tokio::test]
    async fn test_peer_limit() {
        let relay = InMemoryRelayService::new();
        let allocation = relay.create_allocation(1, Some("eu-west")).await.unwrap();
        let code = relay.get_join_code(allocation.allocation_id).await.unwrap();

        relay.join_allocation(&code).await.unwrap();
        let error = relay.join_allocation(&code).await.unwrap_err();
        assert_eq!(error.reason, ServiceReason::SessionFull);
    }

    #[tokio::test]
    async fn test_invalid_arguments_and_codes() {
        let relay = InMemoryRelayService::new();
        let error = relay.create_allocation(0, None).await.unwrap_err();
        assert_eq!(error.reason, ServiceReason::InvalidArgument);

        let error = relay.join_allocation("bogus").await.unwrap_err();
        assert_eq!(error.reason, ServiceReason::InvalidJoinCode);

        let error = relay.get_join_code(uuid::Uuid::new_v4()).await.unwrap_err();
        assert_eq!(error.reason, ServiceReason::NotFound);
    }

    #[tokio::test]
    async fn test_release_invalidates_code() {
        let relay = InMemoryRelayService::new();
        let allocation = relay.create_allocation(3, None).await.unwrap();
        let code = relay.get_join_code(allocation.allocation_id).await.unwrap();

        assert!(relay.release(allocation.allocation_id));
        assert_eq!(relay.allocation_count(), 0);
        assert!(relay.join_allocation(&code).await.is_err());
    }
}
