//! Relay allocation and brokering
//!
//! The relay service hands out allocations and join codes; the broker turns
//! them into transport-ready connection parameters.

pub mod broker;
pub mod params;
pub mod service;

// Re-export commonly used types
pub use broker::{RelayBroker, RelayLink};
pub use params::{ConnectionType, RelayConnectionParams, RelayRole, RelayServerData};
pub use service::{
    Allocation, InMemoryRelayService, JoinAllocation, RelayEndpoint, RelayService,
};
