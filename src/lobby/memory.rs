//! In-memory lobby directory
//!
//! A shared [`InMemoryLobbyService`] backend plays the role of the remote
//! directory for tests and the sandbox binary. Each player talks to it
//! through an [`InMemoryLobbyDirectory`] client that carries the caller's
//! identity, so host-only rules are enforced the same way the remote service
//! enforces them.
//!
//! Sessions without a heartbeat for the inactivity window are removed. When
//! the host leaves, the next member becomes host; when the last member
//! leaves, the session is deleted.

use crate::error::{session_error, ServiceError, ServiceReason, ServiceResult, SessionError};
use crate::lobby::directory::{
    CreateSessionOptions, LobbyDirectory, QuickJoinOptions, UpdateMemberOptions,
    UpdateSessionOptions,
};
use crate::lobby::query::{SessionQuery, MAX_QUERY_COUNT};
use crate::session::{MemberRecord, SessionRecord};
use crate::types::{MemberId, SessionId};
use crate::utils::{generate_join_code, generate_session_id};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Sessions expire after this long without a heartbeat
pub const DEFAULT_INACTIVITY_TTL: Duration = Duration::from_secs(30);

/// Largest capacity the directory accepts
pub const MAX_SESSION_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
struct StoredSession {
    record: SessionRecord,
    last_active: Instant,
    heartbeats: u64,
}

/// Shared in-memory directory backend
#[derive(Clone)]
pub struct InMemoryLobbyService {
    sessions: Arc<RwLock<HashMap<SessionId, StoredSession>>>,
    ttl: Duration,
    available: Arc<AtomicBool>,
}

impl InMemoryLobbyService {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_INACTIVITY_TTL)
    }

    /// Create a backend with a custom inactivity window
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A client acting as `player_id`
    pub fn connect(&self, player_id: impl Into<MemberId>) -> InMemoryLobbyDirectory {
        InMemoryLobbyDirectory {
            service: self.clone(),
            player_id: player_id.into(),
        }
    }

    /// Make every call fail with `Unavailable` until re-enabled
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Remove a session as if it had expired; returns whether it existed
    pub fn expire(&self, session_id: &str) -> bool {
        match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(session_id).is_some(),
            Err(_) => false,
        }
    }

    /// Full record of a session, bypassing visibility rules
    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        let sessions = self.sessions.read().ok()?;
        sessions.get(session_id).map(|s| s.record.clone())
    }

    /// Number of heartbeats a session has received
    pub fn heartbeat_count(&self, session_id: &str) -> u64 {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(session_id).map(|s| s.heartbeats))
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Lock the store after dropping expired sessions
    fn store(&self) -> ServiceResult<RwLockWriteGuard<'_, HashMap<SessionId, StoredSession>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("lobby service unavailable"));
        }

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ServiceError::unavailable("lobby store lock poisoned"))?;

        let ttl = self.ttl;
        sessions.retain(|id, stored| {
            let alive = stored.last_active.elapsed() <= ttl;
            if !alive {
                info!("Session {} expired after {:?} without heartbeat", id, ttl);
            }
            alive
        });

        Ok(sessions)
    }
}

impl Default for InMemoryLobbyService {
    fn default() -> Self {
        Self::new()
    }
}

/// A player's connection to the in-memory directory
#[derive(Clone)]
pub struct InMemoryLobbyDirectory {
    service: InMemoryLobbyService,
    player_id: MemberId,
}

impl InMemoryLobbyDirectory {
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn service(&self) -> &InMemoryLobbyService {
        &self.service
    }

    fn check_caller(&self, member: &MemberRecord) -> ServiceResult<()> {
        if member.id() != self.player_id {
            return Err(ServiceError::forbidden(format!(
                "player {} cannot act as member {}",
                self.player_id,
                member.id()
            )));
        }
        Ok(())
    }

    fn check_host(&self, stored: &StoredSession) -> ServiceResult<()> {
        if !stored.record.is_host(&self.player_id) {
            return Err(ServiceError::forbidden(format!(
                "player {} is not the host of session {}",
                self.player_id,
                stored.record.id()
            )));
        }
        Ok(())
    }

    fn admit(&self, stored: &mut StoredSession, member: MemberRecord) -> ServiceResult<SessionRecord> {
        stored.record.add_member(member).map_err(rejected)?;
        debug!(
            "Player {} joined session {} ({}/{})",
            self.player_id,
            stored.record.id(),
            stored.record.members().len(),
            stored.record.max_members()
        );
        Ok(stored.record.clone())
    }
}

fn missing(session_id: &str) -> ServiceError {
    ServiceError::not_found(format!("session {} not found", session_id))
}

/// Translate a record invariant failure into a service rejection
fn rejected(error: anyhow::Error) -> ServiceError {
    match session_error(&error) {
        Some(SessionError::SessionFull { reason }) => {
            ServiceError::new(ServiceReason::SessionFull, reason.clone())
        }
        Some(SessionError::Conflict { reason }) => {
            ServiceError::new(ServiceReason::Conflict, reason.clone())
        }
        Some(SessionError::NotFound { reason }) => ServiceError::not_found(reason.clone()),
        Some(SessionError::InvalidRequest { reason })
        | Some(SessionError::InvalidSession { reason }) => {
            ServiceError::invalid_argument(reason.clone())
        }
        _ => ServiceError::unavailable(error.to_string()),
    }
}

#[async_trait]
impl LobbyDirectory for InMemoryLobbyDirectory {
    async fn create(
        &self,
        name: &str,
        max_members: usize,
        options: CreateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        if name.trim().is_empty() {
            return Err(ServiceError::invalid_argument("session name cannot be empty"));
        }
        if max_members == 0 || max_members > MAX_SESSION_CAPACITY {
            return Err(ServiceError::invalid_argument(format!(
                "capacity must be between 1 and {}",
                MAX_SESSION_CAPACITY
            )));
        }
        self.check_caller(&options.member)?;

        let mut sessions = self.service.store()?;

        let mut join_code = generate_join_code();
        while sessions.values().any(|s| s.record.join_code() == join_code) {
            join_code = generate_join_code();
        }

        let record = SessionRecord::builder(generate_session_id(), name, max_members)
            .join_code(join_code)
            .host(self.player_id.clone())
            .private(options.is_private)
            .member(options.member)
            .data(options.data)
            .build()
            .map_err(rejected)?;

        info!(
            "Created session {} '{}' (code {}, capacity {}, private {})",
            record.id(),
            record.name(),
            record.join_code(),
            record.max_members(),
            record.is_private()
        );

        sessions.insert(
            record.id().to_string(),
            StoredSession {
                record: record.clone(),
                last_active: Instant::now(),
                heartbeats: 0,
            },
        );
        Ok(record)
    }

    async fn query(&self, query: &SessionQuery) -> ServiceResult<Vec<SessionRecord>> {
        if query.count == 0 || query.count > MAX_QUERY_COUNT {
            return Err(ServiceError::invalid_argument(format!(
                "count must be between 1 and {}",
                MAX_QUERY_COUNT
            )));
        }

        let sessions = self.service.store()?;
        let results = query
            .apply(
                sessions
                    .values()
                    .map(|s| &s.record)
                    .filter(|r| !r.is_private()),
            )
            .iter()
            .map(SessionRecord::public_view)
            .collect();
        Ok(results)
    }

    async fn join_by_id(
        &self,
        session_id: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        self.check_caller(&member)?;
        let mut sessions = self.service.store()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| missing(session_id))?;

        if stored.record.is_private() {
            return Err(ServiceError::forbidden(format!(
                "session {} is private; join by code",
                session_id
            )));
        }
        self.admit(stored, member)
    }

    async fn join_by_code(
        &self,
        join_code: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        let code = join_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ServiceError::invalid_argument("join code cannot be empty"));
        }
        self.check_caller(&member)?;

        let mut sessions = self.service.store()?;
        let stored = sessions
            .values_mut()
            .find(|s| s.record.join_code() == code)
            .ok_or_else(|| {
                ServiceError::new(
                    ServiceReason::InvalidJoinCode,
                    format!("no session with join code {}", code),
                )
            })?;
        self.admit(stored, member)
    }

    async fn quick_join(&self, options: QuickJoinOptions) -> ServiceResult<SessionRecord> {
        self.check_caller(&options.member)?;
        let query = SessionQuery {
            filters: options.filters,
            order: Vec::new(),
            count: MAX_QUERY_COUNT,
        };

        let mut sessions = self.service.store()?;
        let target = sessions
            .values()
            .map(|s| &s.record)
            .filter(|r| !r.is_private() && !r.is_full() && !r.has_member(&self.player_id))
            .filter(|r| query.matches(r))
            .min_by_key(|r| r.created())
            .map(|r| r.id().to_string())
            .ok_or_else(|| ServiceError::not_found("no session matches the quick join filters"))?;

        let stored = sessions
            .get_mut(&target)
            .ok_or_else(|| missing(&target))?;
        self.admit(stored, options.member)
    }

    async fn update(
        &self,
        session_id: &str,
        options: UpdateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        let mut sessions = self.service.store()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| missing(session_id))?;
        self.check_host(stored)?;

        // Changes land on a copy so a rejected option leaves the stored record untouched
        let mut record = stored.record.clone();
        if let Some(max_members) = options.max_members {
            if max_members == 0 || max_members > MAX_SESSION_CAPACITY {
                return Err(ServiceError::invalid_argument(format!(
                    "capacity must be between 1 and {}",
                    MAX_SESSION_CAPACITY
                )));
            }
            record.set_max_members(max_members).map_err(rejected)?;
        }
        if let Some(host_id) = options.host_id {
            record.set_host(&host_id).map_err(rejected)?;
            info!("Session {} host changed to {}", session_id, host_id);
        }
        if let Some(name) = options.name {
            record.set_name(name);
        }
        if let Some(is_private) = options.is_private {
            record.set_private(is_private);
        }
        if let Some(data) = options.data {
            record.merge_data(data);
        }

        stored.record = record;
        stored.last_active = Instant::now();
        Ok(stored.record.clone())
    }

    async fn update_member(
        &self,
        session_id: &str,
        member_id: &str,
        options: UpdateMemberOptions,
    ) -> ServiceResult<SessionRecord> {
        if member_id != self.player_id {
            return Err(ServiceError::forbidden(format!(
                "player {} cannot update member {}",
                self.player_id, member_id
            )));
        }

        let mut sessions = self.service.store()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| missing(session_id))?;
        let member = stored.record.member_mut(member_id).ok_or_else(|| {
            ServiceError::not_found(format!("member {} not in session {}", member_id, session_id))
        })?;
        member.merge_data(options.data).map_err(rejected)?;

        Ok(stored.record.clone())
    }

    async fn remove_member(&self, session_id: &str, member_id: &str) -> ServiceResult<()> {
        let mut sessions = self.service.store()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| missing(session_id))?;

        if member_id != self.player_id && !stored.record.is_host(&self.player_id) {
            return Err(ServiceError::forbidden(format!(
                "player {} cannot remove member {}",
                self.player_id, member_id
            )));
        }

        stored.record.remove_member(member_id).ok_or_else(|| {
            ServiceError::not_found(format!("member {} not in session {}", member_id, session_id))
        })?;
        info!("Member {} left session {}", member_id, session_id);

        if stored.record.members().is_empty() {
            sessions.remove(session_id);
            info!("Session {} deleted after last member left", session_id);
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> ServiceResult<()> {
        let mut sessions = self.service.store()?;
        let stored = sessions.get(session_id).ok_or_else(|| missing(session_id))?;
        self.check_host(stored)?;

        sessions.remove(session_id);
        info!("Deleted session {}", session_id);
        Ok(())
    }

    async fn heartbeat(&self, session_id: &str) -> ServiceResult<()> {
        let mut sessions = self.service.store()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| missing(session_id))?;
        self.check_host(stored)?;

        stored.last_active = Instant::now();
        stored.heartbeats += 1;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> ServiceResult<SessionRecord> {
        let sessions = self.service.store()?;
        let stored = sessions.get(session_id).ok_or_else(|| missing(session_id))?;

        if stored.record.has_member(&self.player_id) {
            Ok(stored.record.clone())
        } else {
            Ok(stored.record.public_view())
        }
    }
}
