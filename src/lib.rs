//! Parlor Lobby - session orchestration for hosted multiplayer lobbies
//!
//! This crate keeps a hosted or joined lobby session alive against a remote
//! lobby directory (heartbeats, polling, expiry detection), brokers relay
//! allocations into a transport, and gates inbound connections with an
//! admission policy.

pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod relay;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{session_error, Result, ServiceError, SessionError};
pub use types::*;

// Re-export key components
pub use lobby::{LobbyDirectory, LobbyOrchestrator, SessionQuery};
pub use relay::{RelayBroker, RelayService};
pub use transport::{AdmissionPolicy, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
