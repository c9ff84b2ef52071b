//! Tick-driven schedulers for session upkeep
//!
//! Both schedulers own a [`SchedulerTimer`] advanced by an externally supplied
//! elapsed time, so they run the same under a frame clock, a tokio interval,
//! or a test loop.

pub mod heartbeat;
pub mod poll;
pub mod timer;

pub use heartbeat::{HeartbeatScheduler, DEFAULT_HEARTBEAT_INTERVAL};
pub use poll::{PollScheduler, PollTicket, DEFAULT_POLL_INTERVAL};
pub use timer::SchedulerTimer;

use serde::Serialize;

/// Whether a scheduler has a session to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Inactive,
    Active,
}
