//! Connection admission policy
//!
//! The transport asks the policy about every inbound connection attempt.
//! Decisions are synchronous and depend only on the connected count and a
//! fixed capacity.

use crate::metrics::MetricsCollector;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Reject reason when the host is full
pub const CAPACITY_EXCEEDED: &str = "capacity exceeded";

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Approve { create_peer_object: bool },
    Reject { reason: String },
}

impl AdmissionDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, AdmissionDecision::Approve { .. })
    }
}

/// Approve while `current_connected < capacity`
pub fn decide(current_connected: usize, capacity: usize) -> AdmissionDecision {
    if current_connected < capacity {
        AdmissionDecision::Approve {
            create_peer_object: true,
        }
    } else {
        AdmissionDecision::Reject {
            reason: CAPACITY_EXCEEDED.to_string(),
        }
    }
}

/// Capacity rule installed into the transport
#[derive(Clone)]
pub struct AdmissionPolicy {
    capacity: usize,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

impl AdmissionPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            metrics_collector: None,
        }
    }

    /// Count decisions in the given collector
    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = Some(metrics_collector);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decide on one inbound attempt
    pub fn evaluate(&self, current_connected: usize) -> AdmissionDecision {
        let decision = decide(current_connected, self.capacity);
        match &decision {
            AdmissionDecision::Approve { .. } => debug!(
                "Approved connection ({}/{})",
                current_connected + 1,
                self.capacity
            ),
            AdmissionDecision::Reject { reason } => info!(
                "Rejected connection at {}/{}: {}",
                current_connected, self.capacity, reason
            ),
        }

        if let Some(metrics) = &self.metrics_collector {
            metrics.record_admission(decision.is_approved());
        }
        decision
    }
}

impl fmt::Debug for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPolicy")
            .field("capacity", &self.capacity)
            .finish()
    }
}
