//! Main application state and service coordination
//!
//! This module wires the lobby orchestrator, relay broker and transport
//! together and drives the scheduler tick loop as a background task.

use crate::config::{validate_config, AppConfig};
use crate::lobby::{InMemoryLobbyService, LobbyOrchestrator, OrchestratorConfig};
use crate::metrics::MetricsCollector;
use crate::relay::{InMemoryRelayService, RelayBroker, RelayLink};
use crate::session::SessionRecord;
use crate::transport::LoopbackTransport;
use crate::types::{Attributes, DataObject, LocalPlayer, RELAY_JOIN_CODE_KEY};
use crate::utils::default_player_name;
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Lobby directory backing the sandbox
    lobby_service: InMemoryLobbyService,

    /// Session lifecycle for the local player
    orchestrator: LobbyOrchestrator,

    /// Relay allocation and transport wiring
    broker: RelayBroker,

    /// Transport the broker wires parameters into
    transport: Arc<LoopbackTransport>,

    /// Shared metrics collector
    metrics_collector: Arc<MetricsCollector>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with in-memory collaborators
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        validate_config(&config).map_err(|e| AppError::Configuration {
            message: e.to_string(),
        })?;

        info!("Initializing {} session service", config.service.name);

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| AppError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let player_name = if config.session.player_name.trim().is_empty() {
            default_player_name()
        } else {
            config.session.player_name.trim().to_string()
        };
        let player = LocalPlayer::anonymous(player_name);
        info!("Signed in as {} ({})", player.name, player.id);

        let lobby_service = InMemoryLobbyService::new();
        let orchestrator = LobbyOrchestrator::with_metrics(
            Arc::new(lobby_service.connect(player.id.clone())),
            player,
            OrchestratorConfig::from(&config.session),
            metrics_collector.clone(),
        );

        let transport = Arc::new(LoopbackTransport::new());
        let broker = RelayBroker::with_metrics(
            Arc::new(InMemoryRelayService::new()),
            transport.clone(),
            &config.relay,
            metrics_collector.clone(),
        )
        .map_err(|e| AppError::Initialization {
            message: format!("Failed to create relay broker: {}", e),
        })?;

        Ok(Self {
            config,
            lobby_service,
            orchestrator,
            broker,
            transport,
            metrics_collector,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the tick loop and health metrics tasks
    pub async fn start(&self) -> Result<(), AppError> {
        let mut running = self.is_running.write().await;
        if *running {
            return Err(AppError::BackgroundTask {
                message: "Service already running".to_string(),
            });
        }
        *running = true;
        drop(running);

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(self.spawn_tick_loop());
        tasks.push(self.spawn_health_metrics());

        info!("{} background tasks started", tasks.len());
        Ok(())
    }

    /// Host a session for the local player and back it with a relay allocation
    ///
    /// The relay join code is stored on the session for members to read.
    pub async fn host_session(&self) -> Result<(SessionRecord, RelayLink)> {
        let session = &self.config.session;
        let mut data = Attributes::new();
        data.insert("GameMode".to_string(), DataObject::public(&session.game_mode));
        data.insert("Map".to_string(), DataObject::public(&session.map));

        let record = self
            .orchestrator
            .create_session(&session.session_name, session.max_members, session.is_private, data)
            .await?;

        let link = match self.broker.allocate(self.config.relay.max_peers).await {
            Ok(link) => link,
            Err(e) => {
                // A session nobody can connect to is useless; take it down again
                if let Err(delete_error) = self.orchestrator.delete().await {
                    warn!("Failed to delete session after relay failure: {}", delete_error);
                }
                return Err(e);
            }
        };

        let mut relay_data = Attributes::new();
        relay_data.insert(
            RELAY_JOIN_CODE_KEY.to_string(),
            DataObject::member(link.join_code.clone()),
        );
        let record = self
            .orchestrator
            .update_attributes(record.id(), relay_data)
            .await?;

        Ok((record, link))
    }

    /// Perform graceful shutdown
    ///
    /// Stops background tasks, deletes a hosted session (or leaves a joined
    /// one) and shuts the transport down.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);
        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        let hosting = self
            .orchestrator
            .hosted()
            .map_err(|e| AppError::BackgroundTask {
                message: e.to_string(),
            })?
            .is_some();
        let joined = self
            .orchestrator
            .joined()
            .map_err(|e| AppError::BackgroundTask {
                message: e.to_string(),
            })?
            .is_some();

        if hosting {
            if let Err(e) = self.orchestrator.delete().await {
                warn!("Failed to delete hosted session: {}", e);
            }
        } else if joined {
            if let Err(e) = self.orchestrator.leave().await {
                warn!("Failed to leave session: {}", e);
            }
        }

        if let Err(e) = self.broker.disconnect().await {
            warn!("Failed to shut down transport: {}", e);
        }

        match self.orchestrator.get_stats() {
            Ok(stats) => info!("Final session statistics: {:?}", stats),
            Err(e) => warn!("Failed to get final stats: {}", e),
        }
        info!("Shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn orchestrator(&self) -> &LobbyOrchestrator {
        &self.orchestrator
    }

    pub fn broker(&self) -> &RelayBroker {
        &self.broker
    }

    pub fn lobby_service(&self) -> &InMemoryLobbyService {
        &self.lobby_service
    }

    pub fn transport(&self) -> Arc<LoopbackTransport> {
        self.transport.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Drive the orchestrator with the measured time between ticks
    fn spawn_tick_loop(&self) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let is_running = self.is_running.clone();
        let period = self.config.tick_interval();

        info!("Starting scheduler tick loop ({}ms interval)", period.as_millis());
        tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(period));
            let mut last = Instant::now();

            while let Some(now) = ticks.next().await {
                if !*is_running.read().await {
                    break;
                }
                let elapsed = now.duration_since(last);
                last = now;

                let report = orchestrator.tick(elapsed).await;
                if report.heartbeat.is_some() || report.poll.is_some() {
                    debug!("Tick report: {:?}", report);
                }
            }

            info!("Scheduler tick loop stopped");
        })
    }

    fn spawn_health_metrics(&self) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let metrics_collector = self.metrics_collector.clone();
        let is_running = self.is_running.clone();
        let started_at = self.started_at;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));

            while *is_running.read().await {
                interval.tick().await;

                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(started_at.elapsed().as_secs() as i64);

                match orchestrator.get_stats() {
                    Ok(stats) => {
                        metrics_collector.update_from_session_stats(&stats);
                        metrics_collector.update_component_health("orchestrator", true);
                        metrics_collector.update_health_status(2);
                    }
                    Err(e) => {
                        error!("Failed to read session stats: {}", e);
                        metrics_collector.update_component_health("orchestrator", false);
                        metrics_collector.update_health_status(0);
                    }
                }
            }

            info!("Health metrics task stopped");
        })
    }

    /// Abort the tick and health tasks
    ///
    /// An aborted tick may leave a poll marked in flight; the orchestrator
    /// polls again only after its next arm, which join and create perform.
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            return;
        }

        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Stopped {} background tasks", task_count);
    }
}
