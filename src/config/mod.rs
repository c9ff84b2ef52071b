//! Configuration management for the parlor-lobby service
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values.

pub mod app;
pub mod relay;
pub mod session;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use relay::RelayConfig;
pub use session::SessionConfig;
