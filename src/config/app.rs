//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! parlor-lobby service, including environment variable and TOML file loading
//! and validation.

use crate::config::relay::RelayConfig;
use crate::config::session::SessionConfig;
use crate::relay::ConnectionType;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub session: SessionConfig,
    pub relay: RelayConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Interval of the scheduler tick loop in milliseconds
    pub tick_interval_ms: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "parlor-lobby".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            tick_interval_ms: 100,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(tick) = env::var("TICK_INTERVAL_MS") {
            config.service.tick_interval_ms = tick
                .parse()
                .map_err(|_| anyhow!("Invalid TICK_INTERVAL_MS value: {}", tick))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Session settings
        if let Ok(player_name) = env::var("PLAYER_NAME") {
            config.session.player_name = player_name;
        }
        if let Ok(session_name) = env::var("SESSION_NAME") {
            config.session.session_name = session_name;
        }
        if let Ok(max_members) = env::var("SESSION_MAX_MEMBERS") {
            config.session.max_members = max_members
                .parse()
                .map_err(|_| anyhow!("Invalid SESSION_MAX_MEMBERS value: {}", max_members))?;
        }
        if let Ok(is_private) = env::var("SESSION_PRIVATE") {
            config.session.is_private = is_private
                .parse()
                .map_err(|_| anyhow!("Invalid SESSION_PRIVATE value: {}", is_private))?;
        }
        if let Ok(game_mode) = env::var("SESSION_GAME_MODE") {
            config.session.game_mode = game_mode;
        }
        if let Ok(map) = env::var("SESSION_MAP") {
            config.session.map = map;
        }
        if let Ok(interval) = env::var("HEARTBEAT_INTERVAL_MS") {
            config.session.heartbeat_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid HEARTBEAT_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(interval) = env::var("POLL_INTERVAL_MS") {
            config.session.poll_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid POLL_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(count) = env::var("QUERY_COUNT") {
            config.session.query_count = count
                .parse()
                .map_err(|_| anyhow!("Invalid QUERY_COUNT value: {}", count))?;
        }

        // Relay settings
        if let Ok(max_peers) = env::var("RELAY_MAX_PEERS") {
            config.relay.max_peers = max_peers
                .parse()
                .map_err(|_| anyhow!("Invalid RELAY_MAX_PEERS value: {}", max_peers))?;
        }
        if let Ok(connection_type) = env::var("RELAY_CONNECTION_TYPE") {
            config.relay.connection_type = connection_type;
        }
        if let Ok(max_connections) = env::var("RELAY_MAX_CONNECTIONS") {
            config.relay.max_connections = max_connections.parse().map_err(|_| {
                anyhow!("Invalid RELAY_MAX_CONNECTIONS value: {}", max_connections)
            })?;
        }
        if let Ok(region) = env::var("RELAY_REGION") {
            config.relay.region = Some(region);
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.service.tick_interval_ms)
    }

    /// Parsed relay connection type
    pub fn connection_type(&self) -> Result<ConnectionType> {
        self.relay.connection_type.parse()
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timings
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }
    if config.session.heartbeat_interval_ms == 0 {
        return Err(anyhow!("Heartbeat interval must be greater than 0"));
    }
    if config.session.poll_interval_ms == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    // Validate session settings
    if config.session.session_name.trim().is_empty() {
        return Err(anyhow!("Session name cannot be empty"));
    }
    if config.session.max_members == 0 || config.session.max_members > 100 {
        return Err(anyhow!("Session capacity must be between 1 and 100"));
    }
    if config.session.query_count == 0 || config.session.query_count > 100 {
        return Err(anyhow!("Query count must be between 1 and 100"));
    }

    // Validate relay settings
    if config.relay.max_peers == 0 || config.relay.max_peers > 100 {
        return Err(anyhow!("Relay max peers must be between 1 and 100"));
    }
    if config.relay.max_connections == 0 {
        return Err(anyhow!("Max connections must be greater than 0"));
    }
    config.connection_type()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        validate_config(&config).unwrap();

        assert_eq!(config.session.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.session.poll_interval(), Duration::from_millis(1500));
        assert_eq!(config.session.query_count, 25);
        assert_eq!(config.relay.max_peers, 3);
        assert_eq!(config.connection_type().unwrap(), ConnectionType::Dtls);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [service]
            log_level = "debug"

            [relay]
            connection_type = "udp"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.service.health_port, 8080);
        assert_eq!(config.connection_type().unwrap(), ConnectionType::Udp);
        assert_eq!(config.session.max_members, 4);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.relay.connection_type = "carrier-pigeon".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.session.max_members = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.session.heartbeat_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("parlor-lobby-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[session]\nsession_name = \"Friday\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.session.session_name, "Friday");
        std::fs::remove_file(&path).unwrap();

        assert!(AppConfig::from_file(&path).is_err());
    }
}
