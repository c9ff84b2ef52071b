//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parlor_lobby::error::ServiceResult;
use parlor_lobby::lobby::{
    CreateSessionOptions, InMemoryLobbyService, LobbyDirectory, LobbyOrchestrator,
    OrchestratorConfig, QuickJoinOptions, SessionQuery, UpdateMemberOptions, UpdateSessionOptions,
};
use parlor_lobby::session::{MemberRecord, SessionRecord};
use parlor_lobby::types::{Attributes, DataObject, LocalPlayer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Start or end of a directory call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Start(&'static str),
    End(&'static str),
}

/// Directory wrapper that records call boundaries and stalls mutating calls
///
/// Lets tests observe whether two operations overlapped.
pub struct RecordingDirectory {
    inner: Arc<dyn LobbyDirectory>,
    delay: Duration,
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl RecordingDirectory {
    pub fn new(inner: Arc<dyn LobbyDirectory>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Calls whose start was followed by another start before their end
    pub fn overlapping_calls(&self) -> usize {
        let mut open = 0usize;
        let mut overlaps = 0usize;
        for event in self.events() {
            match event {
                CallEvent::Start(_) => {
                    if open > 0 {
                        overlaps += 1;
                    }
                    open += 1;
                }
                CallEvent::End(_) => open = open.saturating_sub(1),
            }
        }
        overlaps
    }

    async fn record<T>(
        &self,
        name: &'static str,
        call: impl std::future::Future<Output = T>,
    ) -> T {
        self.push(CallEvent::Start(name));
        tokio::time::sleep(self.delay).await;
        let result = call.await;
        self.push(CallEvent::End(name));
        result
    }

    fn push(&self, event: CallEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl LobbyDirectory for RecordingDirectory {
    async fn create(
        &self,
        name: &str,
        max_members: usize,
        options: CreateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        self.record("create", self.inner.create(name, max_members, options))
            .await
    }

    async fn query(&self, query: &SessionQuery) -> ServiceResult<Vec<SessionRecord>> {
        self.inner.query(query).await
    }

    async fn join_by_id(
        &self,
        session_id: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        self.record("join_by_id", self.inner.join_by_id(session_id, member))
            .await
    }

    async fn join_by_code(
        &self,
        join_code: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        self.record("join_by_code", self.inner.join_by_code(join_code, member))
            .await
    }

    async fn quick_join(&self, options: QuickJoinOptions) -> ServiceResult<SessionRecord> {
        self.record("quick_join", self.inner.quick_join(options))
            .await
    }

    async fn update(
        &self,
        session_id: &str,
        options: UpdateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        self.record("update", self.inner.update(session_id, options))
            .await
    }

    async fn update_member(
        &self,
        session_id: &str,
        member_id: &str,
        options: UpdateMemberOptions,
    ) -> ServiceResult<SessionRecord> {
        self.record(
            "update_member",
            self.inner.update_member(session_id, member_id, options),
        )
        .await
    }

    async fn remove_member(&self, session_id: &str, member_id: &str) -> ServiceResult<()> {
        self.record(
            "remove_member",
            self.inner.remove_member(session_id, member_id),
        )
        .await
    }

    async fn delete(&self, session_id: &str) -> ServiceResult<()> {
        self.record("delete", self.inner.delete(session_id)).await
    }

    async fn heartbeat(&self, session_id: &str) -> ServiceResult<()> {
        self.inner.heartbeat(session_id).await
    }

    async fn get(&self, session_id: &str) -> ServiceResult<SessionRecord> {
        self.inner.get(session_id).await
    }
}

/// Directory whose `get` answers with the record as it was when the call
/// started, after a delay
///
/// Models a slow poll response racing later mutations.
pub struct SlowPollDirectory {
    inner: Arc<dyn LobbyDirectory>,
    delay: Duration,
    gets: AtomicUsize,
}

impl SlowPollDirectory {
    pub fn new(inner: Arc<dyn LobbyDirectory>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            gets: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls issued so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LobbyDirectory for SlowPollDirectory {
    async fn create(
        &self,
        name: &str,
        max_members: usize,
        options: CreateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        self.inner.create(name, max_members, options).await
    }

    async fn query(&self, query: &SessionQuery) -> ServiceResult<Vec<SessionRecord>> {
        self.inner.query(query).await
    }

    async fn join_by_id(
        &self,
        session_id: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        self.inner.join_by_id(session_id, member).await
    }

    async fn join_by_code(
        &self,
        join_code: &str,
        member: MemberRecord,
    ) -> ServiceResult<SessionRecord> {
        self.inner.join_by_code(join_code, member).await
    }

    async fn quick_join(&self, options: QuickJoinOptions) -> ServiceResult<SessionRecord> {
        self.inner.quick_join(options).await
    }

    async fn update(
        &self,
        session_id: &str,
        options: UpdateSessionOptions,
    ) -> ServiceResult<SessionRecord> {
        self.inner.update(session_id, options).await
    }

    async fn update_member(
        &self,
        session_id: &str,
        member_id: &str,
        options: UpdateMemberOptions,
    ) -> ServiceResult<SessionRecord> {
        self.inner.update_member(session_id, member_id, options).await
    }

    async fn remove_member(&self, session_id: &str, member_id: &str) -> ServiceResult<()> {
        self.inner.remove_member(session_id, member_id).await
    }

    async fn delete(&self, session_id: &str) -> ServiceResult<()> {
        self.inner.delete(session_id).await
    }

    async fn heartbeat(&self, session_id: &str) -> ServiceResult<()> {
        self.inner.heartbeat(session_id).await
    }

    async fn get(&self, session_id: &str) -> ServiceResult<SessionRecord> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.get(session_id).await;
        tokio::time::sleep(self.delay).await;
        result
    }
}

/// Orchestrator for `player_id` against the shared in-memory service
pub fn orchestrator(service: &InMemoryLobbyService, player_id: &str) -> LobbyOrchestrator {
    orchestrator_with(service, player_id, OrchestratorConfig::default())
}

pub fn orchestrator_with(
    service: &InMemoryLobbyService,
    player_id: &str,
    config: OrchestratorConfig,
) -> LobbyOrchestrator {
    LobbyOrchestrator::new(
        Arc::new(service.connect(player_id)),
        LocalPlayer::new(player_id, format!("Player-{}", player_id)),
        config,
    )
}

/// Public attributes of a capture-the-flag session
pub fn ctf_attributes(map: &str) -> Attributes {
    let mut data = Attributes::new();
    data.insert("GameMode".to_string(), DataObject::public("CaptureTheFlag"));
    data.insert("Map".to_string(), DataObject::public(map));
    data
}

pub fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), DataObject::public(*value)))
        .collect()
}
