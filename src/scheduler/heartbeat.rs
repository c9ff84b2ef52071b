//! Heartbeat scheduler for hosted sessions
//!
//! The directory expires sessions whose host stops pinging. While a hosted
//! session is armed, each tick counts down and reports the session as due
//! once per interval; the orchestrator performs the actual call.

use crate::scheduler::timer::SchedulerTimer;
use crate::scheduler::SchedulerState;
use crate::types::SessionId;
use std::time::Duration;
use tracing::debug;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Keeps a hosted session alive
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    timer: SchedulerTimer,
    target: Option<SessionId>,
}

impl HeartbeatScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: SchedulerTimer::new(interval),
            target: None,
        }
    }

    /// Start heartbeating a hosted session
    pub fn arm(&mut self, session_id: impl Into<SessionId>) {
        let session_id = session_id.into();
        debug!("Heartbeat armed for session {}", session_id);
        self.target = Some(session_id);
        self.timer.reset();
    }

    /// Stop heartbeating; no later tick fires
    pub fn disarm(&mut self) {
        if let Some(session_id) = self.target.take() {
            debug!("Heartbeat disarmed for session {}", session_id);
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.target.is_some() {
            SchedulerState::Active
        } else {
            SchedulerState::Inactive
        }
    }

    pub fn is_armed(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn interval(&self) -> Duration {
        self.timer.period()
    }

    /// Advance the countdown; returns the session to ping when due
    pub fn tick(&mut self, elapsed: Duration) -> Option<SessionId> {
        let target = self.target.as_ref()?;
        if self.timer.advance(elapsed) {
            Some(target.clone())
        } else {
            None
        }
    }
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
