//! Transport layer seam
//!
//! The transport owns the network session once relay parameters are wired
//! in. It exposes host and client roles and consults an
//! [`AdmissionPolicy`] for every inbound connection.

pub mod admission;
pub mod loopback;

pub use admission::{decide, AdmissionDecision, AdmissionPolicy, CAPACITY_EXCEEDED};
pub use loopback::LoopbackTransport;

use crate::error::Result;
use crate::relay::{RelayConnectionParams, RelayRole};

/// Network transport driven by the relay broker
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Install relay parameters; consumed, never kept by the caller
    fn set_connection_params(&self, params: RelayConnectionParams) -> Result<()>;

    /// Install the policy used for inbound connection attempts
    fn set_admission_policy(&self, policy: AdmissionPolicy);

    /// Start as host using the installed parameters
    fn start_host(&self) -> Result<()>;

    /// Start as client using the installed parameters
    fn start_client(&self) -> Result<()>;

    /// Role the transport is running as, if started
    fn role(&self) -> Option<RelayRole>;

    /// Connected peers, the host included when hosting
    fn connected_peer_count(&self) -> usize;

    /// Stop and drop all connection state
    fn shutdown(&self) -> Result<()>;
}
