//! Service layer for the parlor-lobby sandbox
//!
//! This module contains the application state, background task management
//! and health checks used by the binary.

pub mod app;
pub mod health;

pub use app::{AppError, AppState};
pub use health::{HealthCheck, HealthStatus};
