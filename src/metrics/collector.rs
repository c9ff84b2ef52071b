//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for session orchestration, relay
//! brokering and connection admission using Prometheus metrics.

use crate::lobby::orchestrator::OrchestratorStats;
use crate::relay::RelayRole;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lobby service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Session orchestration metrics
    session_metrics: SessionMetrics,

    /// Relay and admission metrics
    relay_metrics: RelayMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Session orchestration metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Orchestrator operations by name and outcome
    pub operations_total: IntCounterVec,

    /// Sessions currently held locally, by role
    pub active_sessions: IntGaugeVec,

    /// Heartbeat calls by outcome
    pub heartbeats_total: IntCounterVec,

    /// Poll calls by outcome
    pub polls_total: IntCounterVec,

    /// Sessions found deleted or expired by a poll
    pub remote_expiry_total: IntCounter,
}

/// Relay and admission metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Relay allocations by role and outcome
    pub allocations_total: IntCounterVec,

    /// Admission decisions
    pub admission_decisions_total: IntCounterVec,

    /// Peers connected to the transport
    pub connected_peers: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Orchestrator operation durations
    pub operation_duration: HistogramVec,

    /// Relay broker operation durations
    pub relay_operation_duration: HistogramVec,

    /// Scheduler tick durations
    pub tick_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            session_metrics,
            relay_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Get relay metrics
    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Update gauges from orchestrator stats
    pub fn update_from_session_stats(&self, stats: &OrchestratorStats) {
        self.session_metrics
            .active_sessions
            .with_label_values(&["host"])
            .set(i64::from(stats.hosting));

        self.session_metrics
            .active_sessions
            .with_label_values(&["joined"])
            .set(i64::from(stats.joined));
    }

    /// Record an orchestrator operation
    pub fn record_operation(&self, operation: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "error" };

        self.session_metrics
            .operations_total
            .with_label_values(&[operation, outcome])
            .inc();

        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record a heartbeat call
    pub fn record_heartbeat(&self, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.session_metrics
            .heartbeats_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a poll call; outcome is one of applied, stale, expired, error
    pub fn record_poll(&self, outcome: &str) {
        self.session_metrics
            .polls_total
            .with_label_values(&[outcome])
            .inc();

        if outcome == "expired" {
            self.session_metrics.remote_expiry_total.inc();
        }
    }

    /// Record a relay allocation or resolution
    pub fn record_relay_operation(&self, role: RelayRole, success: bool, duration: Duration) {
        let role = match role {
            RelayRole::Host => "host",
            RelayRole::Client => "client",
        };
        let outcome = if success { "success" } else { "error" };

        self.relay_metrics
            .allocations_total
            .with_label_values(&[role, outcome])
            .inc();

        self.performance_metrics
            .relay_operation_duration
            .with_label_values(&[role])
            .observe(duration.as_secs_f64());
    }

    /// Record an admission decision
    pub fn record_admission(&self, approved: bool) {
        let decision = if approved { "approve" } else { "reject" };
        self.relay_metrics
            .admission_decisions_total
            .with_label_values(&[decision])
            .inc();
    }

    /// Update the connected peer gauge
    pub fn update_connected_peers(&self, peers: usize) {
        self.relay_metrics.connected_peers.set(peers as i64);
    }

    /// Record a scheduler tick
    pub fn record_tick(&self, duration: Duration) {
        self.performance_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("parlor_lobby_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "parlor_lobby_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("parlor_lobby_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "parlor_lobby_operations_total",
                "Session operations by outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let active_sessions = IntGaugeVec::new(
            Opts::new("parlor_lobby_active_sessions", "Sessions held locally"),
            &["role"],
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let heartbeats_total = IntCounterVec::new(
            Opts::new("parlor_lobby_heartbeats_total", "Heartbeat calls"),
            &["outcome"],
        )?;
        registry.register(Box::new(heartbeats_total.clone()))?;

        let polls_total = IntCounterVec::new(
            Opts::new("parlor_lobby_polls_total", "Session poll calls"),
            &["outcome"],
        )?;
        registry.register(Box::new(polls_total.clone()))?;

        let remote_expiry_total = IntCounter::new(
            "parlor_lobby_remote_expiry_total",
            "Sessions found deleted or expired remotely",
        )?;
        registry.register(Box::new(remote_expiry_total.clone()))?;

        Ok(Self {
            operations_total,
            active_sessions,
            heartbeats_total,
            polls_total,
            remote_expiry_total,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let allocations_total = IntCounterVec::new(
            Opts::new(
                "parlor_lobby_relay_allocations_total",
                "Relay allocations and resolutions",
            ),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(allocations_total.clone()))?;

        let admission_decisions_total = IntCounterVec::new(
            Opts::new(
                "parlor_lobby_admission_decisions_total",
                "Connection admission decisions",
            ),
            &["decision"],
        )?;
        registry.register(Box::new(admission_decisions_total.clone()))?;

        let connected_peers = IntGauge::new(
            "parlor_lobby_connected_peers",
            "Peers connected to the transport",
        )?;
        registry.register(Box::new(connected_peers.clone()))?;

        Ok(Self {
            allocations_total,
            admission_decisions_total,
            connected_peers,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "parlor_lobby_operation_duration_seconds",
                "Session operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let relay_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "parlor_lobby_relay_operation_duration_seconds",
                "Relay broker operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["role"],
        )?;
        registry.register(Box::new(relay_operation_duration.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "parlor_lobby_tick_duration_seconds",
                "Scheduler tick duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            operation_duration,
            relay_operation_duration,
            tick_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
