//! Poll scheduler for joined sessions
//!
//! Refreshes the cached joined record on a fixed interval. Only one poll is
//! outstanding at a time; a fire while one is in flight is skipped. Each
//! issued poll carries a [`PollTicket`] so a poll issued before the target
//! changed cannot release the slot held by a newer one.

use crate::scheduler::timer::SchedulerTimer;
use crate::scheduler::SchedulerState;
use crate::types::SessionId;
use std::time::Duration;
use tracing::debug;

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Handle for one issued poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub session_id: SessionId,
    generation: u64,
}

/// Periodically refreshes the joined session
#[derive(Debug, Clone)]
pub struct PollScheduler {
    timer: SchedulerTimer,
    target: Option<SessionId>,
    in_flight: bool,
    /// Bumped on every arm and disarm
    generation: u64,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: SchedulerTimer::new(interval),
            target: None,
            in_flight: false,
            generation: 0,
        }
    }

    /// Start polling a joined session
    pub fn arm(&mut self, session_id: impl Into<SessionId>) {
        let session_id = session_id.into();
        debug!("Poll armed for session {}", session_id);
        self.target = Some(session_id);
        self.in_flight = false;
        self.generation += 1;
        self.timer.reset();
    }

    /// Stop polling; no later tick fires
    pub fn disarm(&mut self) {
        if let Some(session_id) = self.target.take() {
            debug!("Poll disarmed for session {}", session_id);
        }
        self.in_flight = false;
        self.generation += 1;
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

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn interval(&self) -> Duration {
        self.timer.period()
    }

    /// Advance the countdown; returns a ticket for the session to fetch when due
    pub fn tick(&mut self, elapsed: Duration) -> Option<PollTicket> {
        let target = self.target.as_ref()?;
        if !self.timer.advance(elapsed) {
            return None;
        }
        if self.in_flight {
            debug!("Poll for session {} still in flight, skipping", target);
            return None;
        }
        self.in_flight = true;
        Some(PollTicket {
            session_id: target.clone(),
            generation: self.generation,
        })
    }

    /// Mark the poll for `ticket` as finished
    ///
    /// Returns false for a ticket issued before the last arm or disarm; the
    /// in-flight slot is left to the current poll.
    pub fn complete(&mut self, ticket: &PollTicket) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "Ignoring completion of superseded poll for session {}",
                ticket.session_id
            );
            return false;
        }
        self.in_flight = false;
        true
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_every_interval() {
        let mut scheduler = PollScheduler::default();
        scheduler.arm("s1");

        let mut fired = 0;
        for _ in 0..60 {
            if let Some(ticket) = scheduler.tick(Duration::from_millis(100)) {
                fired += 1;
                scheduler.complete(&ticket);
            }
        }
        // 6 s / 1.5 s
        assert_eq!(fired, 4);
    }

    #[test]
    fn test_skips_while_in_flight() {
        let mut scheduler = PollScheduler::new(Duration::from_secs(1));
        scheduler.arm("s1");

        let ticket = scheduler.tick(Duration::from_secs(1)).unwrap();
        assert_eq!(ticket.session_id, "s1");
        assert!(scheduler.is_in_flight());
        assert!(scheduler.tick(Duration::from_secs(1)).is_none());

        assert!(scheduler.complete(&ticket));
        assert!(scheduler.tick(Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_superseded_completion_keeps_current_poll_in_flight() {
        let mut scheduler = PollScheduler::new(Duration::from_secs(1));
        scheduler.arm("s1");
        let old = scheduler.tick(Duration::from_secs(1)).unwrap();

        scheduler.disarm();
        scheduler.arm("s2");
        let current = scheduler.tick(Duration::from_secs(1)).unwrap();
        assert_eq!(current.session_id, "s2");

        // The s1 poll returns late
        assert!(!scheduler.complete(&old));
        assert!(scheduler.is_in_flight());
        assert!(scheduler.tick(Duration::from_secs(1)).is_none());

        assert!(scheduler.complete(&current));
        assert!(scheduler.tick(Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_disarm_clears_in_flight() {
        let mut scheduler = PollScheduler::new(Duration::from_secs(1));
        scheduler.arm("s1");
        scheduler.tick(Duration::from_secs(1));
        scheduler.disarm();

        assert_eq!(scheduler.state(), SchedulerState::Inactive);
        assert!(!scheduler.is_in_flight());
        assert!(scheduler.tick(Duration::from_secs(5)).is_none());
    }
}
