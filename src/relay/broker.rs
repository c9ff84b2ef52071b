//! Relay broker
//!
//! Turns a relay allocation (host side) or a join code (client side) into
//! connection parameters and wires them into the transport. Parameters are
//! moved into the transport and never cached here.

use crate::config::RelayConfig;
use crate::error::{Result, SessionError};
use crate::metrics::MetricsCollector;
use crate::relay::params::{ConnectionType, RelayConnectionParams, RelayRole, RelayServerData};
use crate::relay::service::RelayService;
use crate::transport::{AdmissionPolicy, Transport};
use crate::types::AllocationId;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of a wired relay connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayLink {
    pub allocation_id: AllocationId,
    pub join_code: String,
    pub role: RelayRole,
    pub region: String,
    pub endpoint: String,
}

impl RelayLink {
    fn describe(params: &RelayConnectionParams) -> Self {
        Self {
            allocation_id: params.allocation_id(),
            join_code: params.join_code().to_string(),
            role: params.role(),
            region: params.region().to_string(),
            endpoint: params.server_data().endpoint.address(),
        }
    }
}

/// Brokers relay allocations into the transport
#[derive(Clone)]
pub struct RelayBroker {
    relay: Arc<dyn RelayService>,
    transport: Arc<dyn Transport>,
    connection_type: ConnectionType,
    region: Option<String>,
    admission: AdmissionPolicy,
    metrics_collector: Arc<MetricsCollector>,
}

impl RelayBroker {
    /// Create a broker from relay settings
    pub fn new(
        relay: Arc<dyn RelayService>,
        transport: Arc<dyn Transport>,
        config: &RelayConfig,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));
        Self::with_metrics(relay, transport, config, metrics_collector)
    }

    /// Create a broker with metrics collector
    pub fn with_metrics(
        relay: Arc<dyn RelayService>,
        transport: Arc<dyn Transport>,
        config: &RelayConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let connection_type = config.connection_type.parse()?;
        let admission =
            AdmissionPolicy::new(config.max_connections).with_metrics(metrics_collector.clone());

        Ok(Self {
            relay,
            transport,
            connection_type,
            region: config.region.clone(),
            admission,
            metrics_collector,
        })
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Allocate a relay slot and start the transport as host
    ///
    /// The admission policy is installed only once the transport has accepted
    /// the parameters, so a transport that is already running keeps its
    /// current policy. An allocation whose host never connects is reclaimed
    /// by the relay service.
    pub async fn allocate(&self, max_peers: usize) -> Result<RelayLink> {
        self.instrumented(RelayRole::Host, async {
            let allocation = self
                .relay
                .create_allocation(max_peers, self.region.as_deref())
                .await
                .map_err(SessionError::from)?;
            let join_code = self
                .relay
                .get_join_code(allocation.allocation_id)
                .await
                .map_err(SessionError::from)?;

            let server_data = RelayServerData::from_allocation(&allocation, self.connection_type)?;
            let params = RelayConnectionParams::new(
                allocation.allocation_id,
                join_code,
                RelayRole::Host,
                allocation.region.clone(),
                server_data,
            );

            let link = self.wire(params)?;

            info!(
                "Hosting relay allocation {} with join code {} ({} peers)",
                link.allocation_id, link.join_code, max_peers
            );
            Ok(link)
        })
        .await
    }

    /// Resolve a join code and start the transport as client
    pub async fn resolve(&self, join_code: &str) -> Result<RelayLink> {
        self.instrumented(RelayRole::Client, async {
            let allocation = self
                .relay
                .join_allocation(join_code)
                .await
                .map_err(SessionError::from_relay)?;

            let server_data =
                RelayServerData::from_join_allocation(&allocation, self.connection_type)?;
            let params = RelayConnectionParams::new(
                allocation.allocation_id,
                join_code.trim().to_uppercase(),
                RelayRole::Client,
                allocation.region.clone(),
                server_data,
            );

            let link = self.wire(params)?;
            info!(
                "Joined relay allocation {} via {}",
                link.allocation_id, link.endpoint
            );
            Ok(link)
        })
        .await
    }

    /// Shut the transport down; a new allocation is needed to reconnect
    pub async fn disconnect(&self) -> Result<()> {
        self.transport.shutdown()?;
        self.metrics_collector.update_connected_peers(0);
        info!("Relay connection closed");
        Ok(())
    }

    /// Hand parameters to the transport and start it in their role
    fn wire(&self, params: RelayConnectionParams) -> Result<RelayLink> {
        let link = RelayLink::describe(&params);
        self.transport.set_connection_params(params)?;

        match link.role {
            RelayRole::Host => {
                self.transport.set_admission_policy(self.admission.clone());
                self.transport.start_host()?
            }
            RelayRole::Client => self.transport.start_client()?,
        }
        self.metrics_collector
            .update_connected_peers(self.transport.connected_peer_count());
        Ok(link)
    }

    async fn instrumented<F>(&self, role: RelayRole, fut: F) -> Result<RelayLink>
    where
        F: Future<Output = Result<RelayLink>>,
    {
        let timer = self.metrics_collector.start_timer();
        let result = fut.await;
        let duration = timer.stop();

        self.metrics_collector
            .record_relay_operation(role, result.is_ok(), duration);
        if let Err(e) = &result {
            warn!("Relay {} operation failed after {:?}: {}", role, duration, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::session_error;
    use crate::relay::service::InMemoryRelayService;
    use crate::transport::{LoopbackTransport, MockTransport};

    fn broker(relay: &InMemoryRelayService, transport: Arc<dyn Transport>) -> RelayBroker {
        RelayBroker::new(Arc::new(relay.clone()), transport, &RelayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_then_resolve() {
        let relay = InMemoryRelayService::new();
        let host_transport = Arc::new(LoopbackTransport::new());
        let host = broker(&relay, host_transport.clone());

        let link = host.allocate(3).await.unwrap();
        assert_eq!(link.role, RelayRole::Host);
        assert!(!link.join_code.is_empty());
        assert_eq!(host_transport.role(), Some(RelayRole::Host));
        assert_eq!(
            host_transport.with_params(|p| p.server_data().endpoint.connection_type),
            Some(ConnectionType::Dtls)
        );

        let client_transport = Arc::new(LoopbackTransport::new());
        let client = broker(&relay, client_transport.clone());
        let joined = client.resolve(&link.join_code).await.unwrap();
        assert_eq!(joined.allocation_id, link.allocation_id);
        assert_eq!(client_transport.role(), Some(RelayRole::Client));
        assert_eq!(
            client_transport.with_params(|p| !p.server_data().host_connection_data.is_empty()),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_resolve_bogus_code() {
        let relay = InMemoryRelayService::new();
        let client = broker(&relay, Arc::new(LoopbackTransport::new()));

        let error = client.resolve("bogus").await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::InvalidCode { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_endpoint_type() {
        let relay = InMemoryRelayService::with_endpoints(vec![ConnectionType::Udp]);
        let host = broker(&relay, Arc::new(LoopbackTransport::new()));

        let error = host.allocate(3).await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_host_wiring_order() {
        let relay = InMemoryRelayService::new();
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();

        transport
            .expect_set_connection_params()
            .withf(|params| params.role() == RelayRole::Host)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        transport
            .expect_set_admission_policy()
            .withf(|policy| policy.capacity() == 4)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        transport
            .expect_start_host()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        transport.expect_connected_peer_count().return_const(1usize);

        let host = broker(&relay, Arc::new(transport));
        host.allocate(3).await.unwrap();
    }

    #[tokio::test]
    async fn test_running_transport_keeps_its_policy() {
        let relay = InMemoryRelayService::new();
        let mut transport = MockTransport::new();
        transport.expect_set_connection_params().returning(|_| {
            Err(SessionError::TransportFailed {
                message: "cannot change parameters while running".to_string(),
            }
            .into())
        });
        transport.expect_set_admission_policy().times(0);
        transport.expect_start_host().times(0);

        let host = broker(&relay, Arc::new(transport));
        let error = host.allocate(3).await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::TransportFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let relay = InMemoryRelayService::new();
        let mut transport = MockTransport::new();
        transport.expect_set_admission_policy().return_const(());
        transport.expect_set_connection_params().returning(|_| Ok(()));
        transport.expect_start_host().returning(|| {
            Err(SessionError::TransportFailed {
                message: "socket in use".to_string(),
            }
            .into())
        });

        let host = broker(&relay, Arc::new(transport));
        let error = host.allocate(3).await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::TransportFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_shuts_down_transport() {
        let relay = InMemoryRelayService::new();
        let transport = Arc::new(LoopbackTransport::new());
        let host = broker(&relay, transport.clone());

        host.allocate(3).await.unwrap();
        host.disconnect().await.unwrap();
        assert_eq!(transport.role(), None);

        // Parameters are not cached; a fresh allocation is needed
        host.allocate(3).await.unwrap();
        assert_eq!(relay.allocation_count(), 2);
    }
}
