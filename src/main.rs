//! Main entry point for the parlor-lobby sandbox
//!
//! Signs in a local player, hosts a session backed by a relay allocation,
//! keeps it alive with the scheduler tick loop and tears it down again on
//! SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use parlor_lobby::config::{validate_config, AppConfig};
use parlor_lobby::metrics::{HealthServer, HealthServerConfig};
use parlor_lobby::service::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Parlor Lobby - hosted lobby sessions with relay brokering
#[derive(Parser)]
#[command(
    name = "parlor-lobby",
    version,
    about = "Local sandbox for lobby session orchestration",
    long_about = "Parlor Lobby hosts a lobby session against an in-memory directory, keeps it alive \
                 with heartbeats and polling, allocates a relay slot for it and gates inbound \
                 connections with an admission policy."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "NAME", help = "Display name of the local player")]
    player_name: Option<String>,

    #[arg(long, value_name = "NAME", help = "Name of the hosted session")]
    session_name: Option<String>,

    #[arg(long, value_name = "N", help = "Capacity of the hosted session")]
    max_members: Option<usize>,

    #[arg(long, help = "Host a public session instead of a private one")]
    public: bool,

    #[arg(long, value_name = "TYPE", help = "Relay connection type (udp, dtls, wss)")]
    connection_type: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    #[arg(long, help = "Do not serve health and metrics endpoints")]
    no_health_server: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Parlor Lobby sandbox");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Session: '{}' ({} members, {})",
        config.session.session_name,
        config.session.max_members,
        if config.session.is_private { "private" } else { "public" }
    );
    info!(
        "   Heartbeat: {}ms, poll: {}ms, tick: {}ms",
        config.session.heartbeat_interval_ms,
        config.session.poll_interval_ms,
        config.service.tick_interval_ms
    );
    info!(
        "   Relay: {} peers over {}, {} connections",
        config.relay.max_peers, config.relay.connection_type, config.relay.max_connections
    );
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(player_name) = &args.player_name {
        config.session.player_name = player_name.clone();
    }
    if let Some(session_name) = &args.session_name {
        config.session.session_name = session_name.clone();
    }
    if let Some(max_members) = args.max_members {
        config.session.max_members = max_members;
    }
    if args.public {
        config.session.is_private = false;
    }
    if let Some(connection_type) = &args.connection_type {
        config.relay.connection_type = connection_type.clone();
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);
    if args.dry_run {
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match app_state.host_session().await {
        Ok((record, link)) => {
            info!(
                "Hosting '{}' (session code {}, relay code {})",
                record.name(),
                record.join_code(),
                link.join_code
            );
        }
        Err(e) => {
            error!("Failed to host session: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_server = if args.no_health_server {
        None
    } else {
        let server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                app_state.metrics_collector(),
            )
            .with_app_state(app_state.clone()),
        );
        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Health server failed: {}", e);
                }
            })
        };
        Some((server, task))
    };

    info!("Press Ctrl+C to shutdown gracefully...");
    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, beginning graceful shutdown...");

    if let Some((server, task)) = health_server {
        if let Err(e) = server.stop().await {
            warn!("Failed to stop health server: {}", e);
        }
        let _ = task.await;
    }

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Parlor Lobby stopped");
    Ok(())
}
