//! Lobby directory service interface
//!
//! The remote directory owns session records. Each call is a single
//! request/response; failures carry a service reason and message.

use crate::error::ServiceResult;
use crate::lobby::query::{QueryFilter, SessionQuery};
use crate::session::{MemberRecord, SessionRecord};
use crate::types::{Attributes, MemberId};
use async_trait::async_trait;

/// Options for creating a session
#[derive(Debug, Clone)]
pub struct CreateSessionOptions {
    pub is_private: bool,
    /// The creating member; becomes host
    pub member: MemberRecord,
    pub data: Attributes,
}

/// Partial update of a session; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateSessionOptions {
    pub name: Option<String>,
    pub max_members: Option<usize>,
    pub is_private: Option<bool>,
    pub host_id: Option<MemberId>,
    /// Merged into the existing attributes
    pub data: Option<Attributes>,
}

impl UpdateSessionOptions {
    /// Update only the attributes
    pub fn with_data(data: Attributes) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    /// Hand the host role to another member
    pub fn with_host(host_id: impl Into<MemberId>) -> Self {
        Self {
            host_id: Some(host_id.into()),
            ..Default::default()
        }
    }
}

/// Update of one member's attributes
#[derive(Debug, Clone, Default)]
pub struct UpdateMemberOptions {
    pub data: Attributes,
}

/// Options for joining any matching session
#[derive(Debug, Clone)]
pub struct QuickJoinOptions {
    pub filters: Vec<QueryFilter>,
    pub member: MemberRecord,
}

/// Remote lobby directory service
#[async_trait]
pub trait LobbyDirectory: Send + Sync {
    /// Create a session hosted by the caller
    async fn create(
        &self,
        name: &str,
        max_members: usize,
        options: CreateSessionOptions,
    ) -> ServiceResult<SessionRecord>;

    /// List public sessions matching the query; a single page
    async fn query(&self, query: &SessionQuery) -> ServiceResult<Vec<SessionRecord>>;

    /// Join a session by identifier
    async fn join_by_id(&self, session_id: &str, member: MemberRecord)
        -> ServiceResult<SessionRecord>;

    /// Join a session by join code
    async fn join_by_code(&self, join_code: &str, member: MemberRecord)
        -> ServiceResult<SessionRecord>;

    /// Join any public session matching the filters
    async fn quick_join(&self, options: QuickJoinOptions) -> ServiceResult<SessionRecord>;

    /// Update session fields; host only
    async fn update(
        &self,
        session_id: &str,
        options: UpdateSessionOptions,
    ) -> ServiceResult<SessionRecord>;

    /// Update a member's attributes; the member only
    async fn update_member(
        &self,
        session_id: &str,
        member_id: &str,
        options: UpdateMemberOptions,
    ) -> ServiceResult<SessionRecord>;

    /// Remove a member; the member itself or the host
    async fn remove_member(&self, session_id: &str, member_id: &str) -> ServiceResult<()>;

    /// Delete a session; host only
    async fn delete(&self, session_id: &str) -> ServiceResult<()>;

    /// Keep a hosted session from expiring; host only
    async fn heartbeat(&self, session_id: &str) -> ServiceResult<()>;

    /// Fetch a session by identifier
    async fn get(&self, session_id: &str) -> ServiceResult<SessionRecord>;
}
