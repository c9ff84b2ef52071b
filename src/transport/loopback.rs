//! In-process transport
//!
//! Stands in for a real network transport in tests and the sandbox binary.
//! Inbound connections are simulated with [`LoopbackTransport::request_connection`],
//! which runs the installed admission policy exactly as a real host would.

use crate::error::{Result, SessionError};
use crate::relay::{RelayConnectionParams, RelayRole};
use crate::transport::admission::{AdmissionDecision, AdmissionPolicy};
use crate::transport::Transport;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Peer id the host uses for itself
pub const HOST_PEER_ID: &str = "host";

#[derive(Default)]
struct LoopbackState {
    params: Option<RelayConnectionParams>,
    policy: Option<AdmissionPolicy>,
    role: Option<RelayRole>,
    peers: BTreeSet<String>,
}

/// Transport that keeps all peers in memory
#[derive(Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an inbound connection attempt from `peer_id`
    pub fn request_connection(&self, peer_id: &str) -> Result<AdmissionDecision> {
        let mut state = self.lock()?;
        if state.role != Some(RelayRole::Host) {
            return Err(transport_failed("only a running host accepts connections"));
        }
        if state.peers.contains(peer_id) {
            return Ok(AdmissionDecision::Approve {
                create_peer_object: false,
            });
        }

        let decision = match &state.policy {
            Some(policy) => policy.evaluate(state.peers.len()),
            None => AdmissionDecision::Approve {
                create_peer_object: true,
            },
        };
        if decision.is_approved() {
            state.peers.insert(peer_id.to_string());
            debug!("Peer {} connected ({} total)", peer_id, state.peers.len());
        }
        Ok(decision)
    }

    /// Drop a connected peer; returns whether it was connected
    pub fn disconnect_peer(&self, peer_id: &str) -> bool {
        match self.state.lock() {
            Ok(mut state) if peer_id != HOST_PEER_ID => state.peers.remove(peer_id),
            _ => false,
        }
    }

    /// Inspect the installed parameters
    pub fn with_params<R>(&self, f: impl FnOnce(&RelayConnectionParams) -> R) -> Option<R> {
        let state = self.state.lock().ok()?;
        state.params.as_ref().map(f)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LoopbackState>> {
        self.state
            .lock()
            .map_err(|_| transport_failed("transport lock poisoned"))
    }

    fn start(&self, role: RelayRole) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(current) = state.role {
            return Err(transport_failed(&format!("already running as {}", current)));
        }
        let params = state
            .params
            .as_ref()
            .ok_or_else(|| transport_failed("no relay parameters installed"))?;
        if params.role() != role {
            return Err(transport_failed(&format!(
                "parameters are for a {}, cannot start as {}",
                params.role(),
                role
            )));
        }

        info!(
            "Transport started as {} via {} ({})",
            role,
            params.server_data().endpoint.address(),
            params.server_data().endpoint.connection_type
        );
        state.role = Some(role);
        if role == RelayRole::Host {
            state.peers.insert(HOST_PEER_ID.to_string());
        }
        Ok(())
    }
}

fn transport_failed(message: &str) -> anyhow::Error {
    SessionError::TransportFailed {
        message: message.to_string(),
    }
    .into()
}

impl Transport for LoopbackTransport {
    fn set_connection_params(&self, params: RelayConnectionParams) -> Result<()> {
        let mut state = self.lock()?;
        if state.role.is_some() {
            return Err(transport_failed("cannot change parameters while running"));
        }
        state.params = Some(params);
        Ok(())
    }

    fn set_admission_policy(&self, policy: AdmissionPolicy) {
        if let Ok(mut state) = self.state.lock() {
            state.policy = Some(policy);
        }
    }

    fn start_host(&self) -> Result<()> {
        self.start(RelayRole::Host)
    }

    fn start_client(&self) -> Result<()> {
        self.start(RelayRole::Client)
    }

    fn role(&self) -> Option<RelayRole> {
        self.state.lock().ok().and_then(|state| state.role)
    }

    fn connected_peer_count(&self) -> usize {
        self.state.lock().map(|state| state.peers.len()).unwrap_or(0)
    }

    fn shutdown(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.role.is_some() {
            info!("Transport shut down with {} peers", state.peers.len());
        }
        *state = LoopbackState::default();
        Ok(())
    }
}
