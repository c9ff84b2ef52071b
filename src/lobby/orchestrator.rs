//! Lobby orchestrator
//!
//! This module provides the [`LobbyOrchestrator`], which wraps each directory
//! call with error translation and local state updates, and drives the
//! heartbeat and poll schedulers from [`LobbyOrchestrator::tick`].
//!
//! Local session state and both schedulers share one mutex that is never held
//! across a remote call. Mutating operations on one session are serialized
//! with a per-session async lock; polls are checked against the state
//! revision so a slow poll cannot overwrite a newer operation result.

use crate::config::SessionConfig;
use crate::error::{Result, ServiceError, ServiceReason, SessionError};
use crate::lobby::directory::{
    CreateSessionOptions, LobbyDirectory, QuickJoinOptions, UpdateMemberOptions,
    UpdateSessionOptions,
};
use crate::lobby::guard::SessionLocks;
use crate::lobby::query::{QueryFilter, SessionQuery};
use crate::metrics::MetricsCollector;
use crate::scheduler::{HeartbeatScheduler, PollScheduler, PollTicket, SchedulerState};
use crate::session::{LocalSessionState, MemberRecord, PollApply, SessionRecord};
use crate::types::{Attributes, LocalPlayer, SessionId, SessionRole, PLAYER_NAME_KEY};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lock key for operations that change which session is joined
const MEMBERSHIP_LOCK: &str = "membership";

/// Timing and query settings for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between heartbeats for a hosted session
    pub heartbeat_interval: Duration,
    /// Interval between polls of the joined session
    pub poll_interval: Duration,
    /// Result limit for the default session listing
    pub query_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: crate::scheduler::DEFAULT_HEARTBEAT_INTERVAL,
            poll_interval: crate::scheduler::DEFAULT_POLL_INTERVAL,
            query_count: crate::lobby::query::DEFAULT_QUERY_COUNT,
        }
    }
}

impl From<&SessionConfig> for OrchestratorConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            query_count: config.query_count,
        }
    }
}

/// Statistics about orchestrator operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStats {
    /// Sessions created by this process
    pub sessions_created: u64,
    /// Sessions joined by id, code or quick join
    pub sessions_joined: u64,
    /// Operations that returned an error
    pub operations_failed: u64,
    /// Successful heartbeat calls
    pub heartbeats_sent: u64,
    /// Failed heartbeat calls
    pub heartbeats_failed: u64,
    /// Polls whose result replaced the joined record
    pub polls_applied: u64,
    /// Polls discarded because state moved on
    pub polls_stale: u64,
    /// Polls that failed with a non-NotFound error
    pub polls_failed: u64,
    /// Sessions found deleted, expired or left remotely
    pub remote_expiries: u64,
    /// Ticks processed
    pub ticks: u64,
    /// Whether a session is currently hosted
    pub hosting: bool,
    /// Whether a session is currently joined
    pub joined: bool,
}

/// Result of a due heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Sent,
    Failed(SessionError),
}

/// Result of a due poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cached record was replaced
    Applied,
    /// Discarded; a newer operation result is cached
    Stale,
    /// The session no longer exists; local state cleared
    Expired,
    /// The local player is no longer a member; local state cleared
    Removed,
    Failed(SessionError),
}

/// What a tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub heartbeat: Option<HeartbeatOutcome>,
    pub poll: Option<PollOutcome>,
}

/// State guarded by the core mutex
struct SessionCore {
    state: LocalSessionState,
    heartbeat: HeartbeatScheduler,
    poll: PollScheduler,
    player: LocalPlayer,
}

impl SessionCore {
    /// Clear a session and disarm whatever targeted it
    fn drop_session(&mut self, session_id: &str) {
        self.state.clear_session(session_id);
        if self.heartbeat.target() == Some(session_id) {
            self.heartbeat.disarm();
        }
        if self.poll.target() == Some(session_id) {
            self.poll.disarm();
        }
    }

    /// Align the hosted reference and heartbeat with the joined record's host
    fn reconcile_host_role(&mut self) {
        let Some(joined) = self.state.joined().cloned() else {
            return;
        };
        let is_host = joined.is_host(&self.player.id);
        let was_host = self.state.hosted_id() == Some(joined.id());

        if is_host && !was_host {
            info!("Player {} is now host of session {}", self.player.id, joined.id());
            self.heartbeat.arm(joined.id());
            self.state.promote_to_host(joined);
        } else if was_host && !is_host {
            info!("Player {} is no longer host of session {}", self.player.id, joined.id());
            self.heartbeat.disarm();
            self.state.release_host(joined);
        }
    }
}

/// Orchestrates session lifecycle against a lobby directory
#[derive(Clone)]
pub struct LobbyOrchestrator {
    /// Remote lobby directory
    directory: Arc<dyn LobbyDirectory>,
    /// Local state and schedulers
    core: Arc<Mutex<SessionCore>>,
    /// Per-session operation locks
    locks: SessionLocks,
    /// Orchestrator settings
    config: OrchestratorConfig,
    /// Orchestrator statistics
    stats: Arc<RwLock<OrchestratorStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl LobbyOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        directory: Arc<dyn LobbyDirectory>,
        player: LocalPlayer,
        config: OrchestratorConfig,
    ) -> Self {
        // Create a default metrics collector if none provided
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(directory, player, config, metrics_collector)
    }

    /// Create a new orchestrator with metrics collector
    pub fn with_metrics(
        directory: Arc<dyn LobbyDirectory>,
        player: LocalPlayer,
        config: OrchestratorConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let core = SessionCore {
            state: LocalSessionState::new(),
            heartbeat: HeartbeatScheduler::new(config.heartbeat_interval),
            poll: PollScheduler::new(config.poll_interval),
            player,
        };

        Self {
            directory,
            core: Arc::new(Mutex::new(core)),
            locks: SessionLocks::new(),
            config,
            stats: Arc::new(RwLock::new(OrchestratorStats::default())),
            metrics_collector,
        }
    }

    /// Create a session hosted by the local player
    pub async fn create_session(
        &self,
        name: &str,
        max_members: usize,
        is_private: bool,
        data: Attributes,
    ) -> Result<SessionRecord> {
        self.instrumented("create_session", async {
            let _guard = self.locks.acquire(MEMBERSHIP_LOCK).await;
            let member = self.prepare_join()?;

            let record = self
                .directory
                .create(
                    name,
                    max_members,
                    CreateSessionOptions {
                        is_private,
                        member,
                        data,
                    },
                )
                .await
                .map_err(remote)?;

            {
                let mut core = self.core()?;
                core.state.host_session(record.clone());
                core.heartbeat.arm(record.id());
                core.poll.arm(record.id());
            }
            self.update_stats(|stats| stats.sessions_created += 1);

            info!(
                "Hosting session {} '{}' with join code {}",
                record.id(),
                record.name(),
                record.join_code()
            );
            Ok(record)
        })
        .await
    }

    /// List sessions matching a query; a single page
    pub async fn find_sessions(&self, query: &SessionQuery) -> Result<Vec<SessionRecord>> {
        self.instrumented("find_sessions", async {
            let sessions = self.directory.query(query).await.map_err(remote)?;
            debug!("Query returned {} sessions", sessions.len());
            Ok(sessions)
        })
        .await
    }

    /// The default listing: open sessions, newest first
    pub fn default_query(&self) -> SessionQuery {
        SessionQuery::default().count(self.config.query_count)
    }

    /// Join a public session by identifier
    pub async fn join_by_id(&self, session_id: &str) -> Result<SessionRecord> {
        self.instrumented("join_by_id", async {
            let _guard = self.locks.acquire(MEMBERSHIP_LOCK).await;
            let member = self.prepare_join()?;
            let record = self
                .directory
                .join_by_id(session_id, member)
                .await
                .map_err(remote)?;
            self.enter_session(record)
        })
        .await
    }

    /// Join a session by its join code
    pub async fn join_by_code(&self, join_code: &str) -> Result<SessionRecord> {
        self.instrumented("join_by_code", async {
            let _guard = self.locks.acquire(MEMBERSHIP_LOCK).await;
            let member = self.prepare_join()?;
            let record = self
                .directory
                .join_by_code(join_code, member)
                .await
                .map_err(remote)?;
            self.enter_session(record)
        })
        .await
    }

    /// Join any session with an open slot
    pub async fn quick_join(&self) -> Result<SessionRecord> {
        self.quick_join_with(vec![QueryFilter::has_open_slots()]).await
    }

    /// Join any session matching the filters
    pub async fn quick_join_with(&self, filters: Vec<QueryFilter>) -> Result<SessionRecord> {
        self.instrumented("quick_join", async {
            let _guard = self.locks.acquire(MEMBERSHIP_LOCK).await;
            let member = self.prepare_join()?;
            let record = self
                .directory
                .quick_join(QuickJoinOptions { filters, member })
                .await
                .map_err(remote)?;
            self.enter_session(record)
        })
        .await
    }

    /// Merge session attributes; the directory allows this for the host only
    pub async fn update_attributes(
        &self,
        session_id: &str,
        data: Attributes,
    ) -> Result<SessionRecord> {
        self.instrumented("update_attributes", async {
            let _guard = self.locks.acquire(session_id).await;
            let record = self
                .directory
                .update(session_id, UpdateSessionOptions::with_data(data))
                .await
                .map_err(remote)?;

            self.core()?.state.replace(record.clone());
            info!("Updated attributes of session {}", session_id);
            Ok(record)
        })
        .await
    }

    /// Update the local player's member attributes in the joined session
    pub async fn update_local_member(&self, data: Attributes) -> Result<SessionRecord> {
        self.instrumented("update_local_member", async {
            let (session_id, player_id) = self.active_session()?;
            let _guard = self.locks.acquire(&session_id).await;

            let record = self
                .directory
                .update_member(
                    &session_id,
                    &player_id,
                    UpdateMemberOptions { data: data.clone() },
                )
                .await
                .map_err(remote)?;

            {
                let mut core = self.core()?;
                core.state.replace(record.clone());
                if let Some(name) = data.get(PLAYER_NAME_KEY) {
                    info!("Player {} renamed to {}", player_id, name.value);
                    core.player.name = name.value.clone();
                }
            }
            Ok(record)
        })
        .await
    }

    /// Hand the host role of the joined session to another member
    pub async fn migrate_host(&self, new_host_id: &str) -> Result<SessionRecord> {
        self.instrumented("migrate_host", async {
            let (session_id, _) = self.active_session()?;
            let _guard = self.locks.acquire(&session_id).await;

            let record = self
                .directory
                .update(&session_id, UpdateSessionOptions::with_host(new_host_id))
                .await
                .map_err(remote)?;

            {
                let mut core = self.core()?;
                core.state.replace(record.clone());
                core.reconcile_host_role();
            }

            info!("Session {} host is now {}", session_id, record.host_id());
            Ok(record)
        })
        .await
    }

    /// Leave the joined session
    pub async fn leave(&self) -> Result<()> {
        self.instrumented("leave", async {
            let (session_id, player_id) = self.active_session()?;
            let _guard = self.locks.acquire(&session_id).await;

            let result = self
                .directory
                .remove_member(&session_id, &player_id)
                .await;

            match result {
                Ok(()) => {
                    self.core()?.drop_session(&session_id);
                    info!("Left session {}", session_id);
                    Ok(())
                }
                Err(e) if e.reason == ServiceReason::NotFound => {
                    // Already gone remotely; nothing left to hold on to
                    self.core()?.drop_session(&session_id);
                    Err(remote(e))
                }
                Err(e) => Err(remote(e)),
            }
        })
        .await
    }

    /// Delete the joined session; the directory allows this for the host only
    pub async fn delete(&self) -> Result<()> {
        self.instrumented("delete", async {
            let (session_id, _) = self.active_session()?;
            let _guard = self.locks.acquire(&session_id).await;

            self.directory.delete(&session_id).await.map_err(remote)?;
            self.core()?.drop_session(&session_id);

            info!("Deleted session {}", session_id);
            Ok(())
        })
        .await
    }

    /// Advance both schedulers and perform due heartbeat and poll calls
    ///
    /// Failures are logged and reported; nothing is returned as an error.
    pub async fn tick(&self, elapsed: Duration) -> TickReport {
        let timer = self.metrics_collector.start_timer();

        let due = match self.core.lock() {
            Ok(mut core) => {
                let revision = core.state.revision();
                let heartbeat = core.heartbeat.tick(elapsed);
                let poll = core.poll.tick(elapsed).map(|ticket| (ticket, revision));
                Some((heartbeat, poll))
            }
            Err(_) => None,
        };
        let Some((heartbeat_due, poll_due)) = due else {
            error!("Session state lock poisoned; skipping tick");
            return TickReport::default();
        };

        let (heartbeat, poll) = tokio::join!(
            async {
                match heartbeat_due {
                    Some(session_id) => Some(self.send_heartbeat(&session_id).await),
                    None => None,
                }
            },
            async {
                match poll_due {
                    Some((ticket, revision)) => Some(self.poll_session(&ticket, revision).await),
                    None => None,
                }
            }
        );

        self.update_stats(|stats| stats.ticks += 1);
        self.metrics_collector.record_tick(timer.stop());
        TickReport { heartbeat, poll }
    }

    /// The local player
    pub fn player(&self) -> Result<LocalPlayer> {
        Ok(self.core()?.player.clone())
    }

    /// Snapshot of the local session state
    pub fn state(&self) -> Result<LocalSessionState> {
        Ok(self.core()?.state.clone())
    }

    pub fn hosted(&self) -> Result<Option<SessionRecord>> {
        Ok(self.core()?.state.hosted().cloned())
    }

    pub fn joined(&self) -> Result<Option<SessionRecord>> {
        Ok(self.core()?.state.joined().cloned())
    }

    /// The local player's role in the joined session
    pub fn role(&self) -> Result<Option<SessionRole>> {
        let core = self.core()?;
        Ok(match (core.state.is_hosting(), core.state.joined().is_some()) {
            (true, _) => Some(SessionRole::Host),
            (false, true) => Some(SessionRole::Member),
            (false, false) => None,
        })
    }

    pub fn heartbeat_state(&self) -> Result<SchedulerState> {
        Ok(self.core()?.heartbeat.state())
    }

    pub fn poll_state(&self) -> Result<SchedulerState> {
        Ok(self.core()?.poll.state())
    }

    /// Get orchestrator statistics
    pub fn get_stats(&self) -> Result<OrchestratorStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| SessionError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();

        let core = self.core()?;
        stats.hosting = core.state.is_hosting();
        stats.joined = core.state.joined().is_some();
        Ok(stats)
    }

    async fn send_heartbeat(&self, session_id: &str) -> HeartbeatOutcome {
        match self.directory.heartbeat(session_id).await {
            Ok(()) => {
                debug!("Heartbeat sent for session {}", session_id);
                self.metrics_collector.record_heartbeat(true);
                self.update_stats(|stats| stats.heartbeats_sent += 1);
                HeartbeatOutcome::Sent
            }
            Err(e) => {
                // Expiry is only concluded from a poll returning NotFound
                warn!("Heartbeat for session {} failed: {}", session_id, e);
                self.metrics_collector.record_heartbeat(false);
                self.update_stats(|stats| stats.heartbeats_failed += 1);
                HeartbeatOutcome::Failed(e.into())
            }
        }
    }

    async fn poll_session(&self, ticket: &PollTicket, revision: u64) -> PollOutcome {
        let session_id = ticket.session_id.as_str();
        let result = self.directory.get(session_id).await;

        let mut core = match self.core.lock() {
            Ok(core) => core,
            Err(_) => {
                error!("Session state lock poisoned; dropping poll result");
                return PollOutcome::Failed(SessionError::InternalError {
                    message: "Failed to acquire session lock".to_string(),
                });
            }
        };
        core.poll.complete(ticket);

        let current = core.state.revision() == revision
            && core.state.joined_id() == Some(session_id);

        let outcome = match result {
            Ok(record) if current && !record.has_member(&core.player.id) => {
                info!(
                    "Player {} is no longer a member of session {}; clearing local state",
                    core.player.id, session_id
                );
                core.drop_session(session_id);
                PollOutcome::Removed
            }
            Ok(record) => match core.state.apply_poll(revision, record) {
                PollApply::Applied => {
                    core.reconcile_host_role();
                    PollOutcome::Applied
                }
                PollApply::Stale => PollOutcome::Stale,
            },
            Err(e) if e.reason == ServiceReason::NotFound => {
                if current {
                    info!("Session {} no longer exists; clearing local state", session_id);
                    core.drop_session(session_id);
                    PollOutcome::Expired
                } else {
                    PollOutcome::Stale
                }
            }
            Err(e) => {
                warn!("Poll for session {} failed: {}", session_id, e);
                PollOutcome::Failed(e.into())
            }
        };
        drop(core);

        let label = match &outcome {
            PollOutcome::Applied => "applied",
            PollOutcome::Stale => "stale",
            PollOutcome::Expired | PollOutcome::Removed => "expired",
            PollOutcome::Failed(_) => "error",
        };
        self.metrics_collector.record_poll(label);
        self.update_stats(|stats| match &outcome {
            PollOutcome::Applied => stats.polls_applied += 1,
            PollOutcome::Stale => stats.polls_stale += 1,
            PollOutcome::Expired | PollOutcome::Removed => stats.remote_expiries += 1,
            PollOutcome::Failed(_) => stats.polls_failed += 1,
        });
        outcome
    }

    /// Check nothing is joined and build the local member record
    fn prepare_join(&self) -> Result<MemberRecord> {
        let core = self.core()?;
        if let Some(session_id) = core.state.joined_id() {
            return Err(SessionError::Conflict {
                reason: format!("already in session {}", session_id),
            }
            .into());
        }
        MemberRecord::for_player(&core.player)
    }

    /// Record a joined session and start polling it
    fn enter_session(&self, record: SessionRecord) -> Result<SessionRecord> {
        {
            let mut core = self.core()?;
            core.state.join_session(record.clone());
            core.poll.arm(record.id());
            core.reconcile_host_role();
        }
        self.update_stats(|stats| stats.sessions_joined += 1);

        info!(
            "Joined session {} '{}' ({}/{})",
            record.id(),
            record.name(),
            record.members().len(),
            record.max_members()
        );
        Ok(record)
    }

    /// Joined session id and local player id, or `NoActiveSession`
    fn active_session(&self) -> Result<(SessionId, String)> {
        let core = self.core()?;
        let session_id = core
            .state
            .joined_id()
            .ok_or(SessionError::NoActiveSession)?
            .to_string();
        Ok((session_id, core.player.id.clone()))
    }

    fn core(&self) -> Result<MutexGuard<'_, SessionCore>> {
        self.core.lock().map_err(|_| {
            SessionError::InternalError {
                message: "Failed to acquire session lock".to_string(),
            }
            .into()
        })
    }

    fn update_stats(&self, update: impl FnOnce(&mut OrchestratorStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => error!("Failed to acquire stats lock"),
        }
    }

    /// Run an operation with logging, metrics and stats
    async fn instrumented<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timer = self.metrics_collector.start_timer();
        let result = fut.await;
        let duration = timer.stop();

        self.metrics_collector
            .record_operation(operation, result.is_ok(), duration);
        if let Err(e) = &result {
            warn!("Operation {} failed after {:?}: {}", operation, duration, e);
            self.update_stats(|stats| stats.operations_failed += 1);
        }

        if let Ok(stats) = self.get_stats() {
            self.metrics_collector.update_from_session_stats(&stats);
        }
        result
    }
}

/// Translate a directory failure into an operation error
fn remote(error: ServiceError) -> anyhow::Error {
    SessionError::from(error).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::session_error;
    use crate::lobby::memory::InMemoryLobbyService;
    use crate::types::DataObject;

    fn orchestrator(service: &InMemoryLobbyService, id: &str) -> LobbyOrchestrator {
        let directory = Arc::new(service.connect(id));
        LobbyOrchestrator::new(
            directory,
            LocalPlayer::new(id, format!("Player-{}", id)),
            OrchestratorConfig::default(),
        )
    }

    fn ctf() -> Attributes {
        let mut data = Attributes::new();
        data.insert("GameMode".to_string(), DataObject::public("CaptureTheFlag"));
        data.insert("Map".to_string(), DataObject::public("Dust"));
        data
    }

    #[tokio::test]
    async fn test_create_arms_both_schedulers() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");

        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        assert_eq!(host.hosted().unwrap().unwrap().id(), record.id());
        assert_eq!(host.joined().unwrap().unwrap().id(), record.id());
        assert_eq!(host.heartbeat_state().unwrap(), SchedulerState::Active);
        assert_eq!(host.poll_state().unwrap(), SchedulerState::Active);
        assert_eq!(host.role().unwrap(), Some(SessionRole::Host));
    }

    #[tokio::test]
    async fn test_create_while_joined_conflicts() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        let error = host.create_session("Other", 4, false, ctf()).await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::Conflict { .. })
        ));
        assert_eq!(host.get_stats().unwrap().operations_failed, 1);
    }

    #[tokio::test]
    async fn test_operations_without_session() {
        let service = InMemoryLobbyService::new();
        let player = orchestrator(&service, "p");

        for error in [
            player.leave().await.unwrap_err(),
            player.delete().await.unwrap_err(),
            player.migrate_host("x").await.unwrap_err(),
            player.update_local_member(Attributes::new()).await.unwrap_err(),
        ] {
            assert_eq!(session_error(&error), Some(&SessionError::NoActiveSession));
        }
    }

    #[tokio::test]
    async fn test_join_errors_translate() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 1, false, ctf()).await.unwrap();

        let guest = orchestrator(&service, "guest");
        let error = guest.join_by_id(record.id()).await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::SessionFull { .. })
        ));

        let error = guest.join_by_code("NOPE42").await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::NotFound { .. })
        ));
        assert!(guest.joined().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_arms_poll_only() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        let guest = orchestrator(&service, "guest");
        guest.join_by_code(record.join_code()).await.unwrap();
        assert_eq!(guest.poll_state().unwrap(), SchedulerState::Active);
        assert_eq!(guest.heartbeat_state().unwrap(), SchedulerState::Inactive);
        assert_eq!(guest.role().unwrap(), Some(SessionRole::Member));
    }

    #[tokio::test]
    async fn test_update_attributes_requires_host() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        let guest = orchestrator(&service, "guest");
        guest.join_by_id(record.id()).await.unwrap();

        let mut data = Attributes::new();
        data.insert("GameMode".to_string(), DataObject::public("Deathmatch"));

        let error = guest
            .update_attributes(record.id(), data.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::Forbidden { .. })
        ));

        let updated = host.update_attributes(record.id(), data).await.unwrap();
        assert_eq!(updated.attribute("GameMode").unwrap().value, "Deathmatch");
        assert_eq!(
            host.hosted().unwrap().unwrap().attribute("GameMode").unwrap().value,
            "Deathmatch"
        );
    }

    #[tokio::test]
    async fn test_update_local_member_renames_player() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        let player = LocalPlayer::new("host", "NiceGuy7");
        host.update_local_member(player.attributes()).await.unwrap();

        assert_eq!(host.player().unwrap().name, "NiceGuy7");
        let joined = host.joined().unwrap().unwrap();
        assert_eq!(joined.member("host").unwrap().display_name(), Some("NiceGuy7"));
    }

    #[tokio::test]
    async fn test_migrate_host_moves_heartbeat() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        let guest = orchestrator(&service, "guest");
        guest.join_by_id(record.id()).await.unwrap();

        let migrated = host.migrate_host("guest").await.unwrap();
        assert!(migrated.is_host("guest"));
        assert!(host.hosted().unwrap().is_none());
        assert!(host.joined().unwrap().is_some());
        assert_eq!(host.heartbeat_state().unwrap(), SchedulerState::Inactive);

        // The new host learns of the promotion by polling
        let report = guest.tick(Duration::from_millis(1500)).await;
        assert_eq!(report.poll, Some(PollOutcome::Applied));
        assert!(guest.joined().unwrap().unwrap().is_host("guest"));
        assert!(guest.hosted().unwrap().is_some());
        assert_eq!(guest.heartbeat_state().unwrap(), SchedulerState::Active);
    }

    #[tokio::test]
    async fn test_leave_clears_state() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        let guest = orchestrator(&service, "guest");
        guest.join_by_id(record.id()).await.unwrap();

        guest.leave().await.unwrap();
        assert!(guest.state().unwrap().is_empty());
        assert_eq!(guest.poll_state().unwrap(), SchedulerState::Inactive);
        assert_eq!(service.session(record.id()).unwrap().members().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_clears_state_and_stops_heartbeat() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        host.delete().await.unwrap();
        assert!(host.state().unwrap().is_empty());
        assert!(service.session(record.id()).is_none());

        let report = host.tick(Duration::from_secs(60)).await;
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn test_tick_heartbeats_hosted_session() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        let report = host.tick(Duration::from_secs(14)).await;
        assert!(report.heartbeat.is_none());

        let report = host.tick(Duration::from_secs(1)).await;
        assert_eq!(report.heartbeat, Some(HeartbeatOutcome::Sent));
        assert_eq!(service.heartbeat_count(record.id()), 1);
    }

    #[tokio::test]
    async fn test_failed_heartbeat_keeps_state() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        service.set_available(false);
        let report = host.tick(Duration::from_secs(15)).await;
        assert!(matches!(
            report.heartbeat,
            Some(HeartbeatOutcome::Failed(SessionError::ServiceUnavailable { .. }))
        ));
        assert!(matches!(report.poll, Some(PollOutcome::Failed(_))));
        assert!(host.hosted().unwrap().is_some());
        assert_eq!(host.get_stats().unwrap().heartbeats_failed, 1);
    }

    #[tokio::test]
    async fn test_poll_not_found_clears_state() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();

        service.expire(record.id());
        let report = host.tick(Duration::from_millis(1500)).await;
        assert_eq!(report.poll, Some(PollOutcome::Expired));
        assert!(host.state().unwrap().is_empty());
        assert_eq!(host.heartbeat_state().unwrap(), SchedulerState::Inactive);
        assert_eq!(host.poll_state().unwrap(), SchedulerState::Inactive);
        assert_eq!(host.get_stats().unwrap().remote_expiries, 1);
    }

    #[tokio::test]
    async fn test_poll_detects_removal() {
        let service = InMemoryLobbyService::new();
        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        let guest = orchestrator(&service, "guest");
        guest.join_by_id(record.id()).await.unwrap();

        service
            .connect("host")
            .remove_member(record.id(), "guest")
            .await
            .unwrap();

        let report = guest.tick(Duration::from_millis(1500)).await;
        assert_eq!(report.poll, Some(PollOutcome::Removed));
        assert!(guest.state().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quick_join() {
        let service = InMemoryLobbyService::new();
        let guest = orchestrator(&service, "guest");

        let error = guest.quick_join().await.unwrap_err();
        assert!(matches!(
            session_error(&error),
            Some(SessionError::NotFound { .. })
        ));

        let host = orchestrator(&service, "host");
        let record = host.create_session("Lobby", 4, false, ctf()).await.unwrap();
        let joined = guest.quick_join().await.unwrap();
        assert_eq!(joined.id(), record.id());
    }
}
