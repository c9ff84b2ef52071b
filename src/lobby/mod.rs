//! Lobby session orchestration
//!
//! This module talks to the remote lobby directory and keeps the local view
//! of the hosted or joined session fresh through heartbeats and polling.

pub mod directory;
pub mod guard;
pub mod memory;
pub mod orchestrator;
pub mod query;

// Re-export commonly used types
pub use directory::{
    CreateSessionOptions, LobbyDirectory, QuickJoinOptions, UpdateMemberOptions,
    UpdateSessionOptions,
};
pub use guard::SessionLocks;
pub use memory::{InMemoryLobbyDirectory, InMemoryLobbyService};
pub use orchestrator::{
    HeartbeatOutcome, LobbyOrchestrator, OrchestratorConfig, OrchestratorStats, PollOutcome,
    TickReport,
};
pub use query::{FilterOp, QueryField, QueryFilter, QueryOrder, SessionQuery};
