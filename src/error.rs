//! Error types for the session orchestration layer
//!
//! Operations return `anyhow::Result` carrying a [`SessionError`]; callers that
//! need to branch on the failure kind downcast with [`session_error`].
//! Remote collaborators report failures as [`ServiceError`], which the
//! orchestrator and relay broker translate at their operation boundary.

use std::fmt;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result type returned by remote service clients
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure kinds surfaced to callers of session and relay operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Session is full: {reason}")]
    SessionFull { reason: String },

    #[error("Invalid relay join code: {reason}")]
    InvalidCode { reason: String },

    #[error("Service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid session record: {reason}")]
    InvalidSession { reason: String },

    #[error("No active session")]
    NoActiveSession,

    #[error("Transport failure: {message}")]
    TransportFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl SessionError {
    /// Translate a relay service failure. Unknown or expired codes surface as
    /// `InvalidCode`; everything else follows the directory mapping.
    pub fn from_relay(error: ServiceError) -> Self {
        match error.reason {
            ServiceReason::NotFound | ServiceReason::InvalidJoinCode => SessionError::InvalidCode {
                reason: error.message,
            },
            _ => error.into(),
        }
    }
}

impl From<ServiceError> for SessionError {
    fn from(error: ServiceError) -> Self {
        let reason = error.message;
        match error.reason {
            ServiceReason::NotFound | ServiceReason::InvalidJoinCode => {
                SessionError::NotFound { reason }
            }
            ServiceReason::Forbidden => SessionError::Forbidden { reason },
            ServiceReason::SessionFull => SessionError::SessionFull { reason },
            ServiceReason::Conflict => SessionError::Conflict { reason },
            ServiceReason::InvalidArgument => SessionError::InvalidRequest { reason },
            ServiceReason::RateLimited | ServiceReason::Unavailable => {
                SessionError::ServiceUnavailable { reason }
            }
        }
    }
}

/// Downcast an operation error to its [`SessionError`] kind
pub fn session_error(error: &anyhow::Error) -> Option<&SessionError> {
    error.downcast_ref::<SessionError>()
}

/// Reason codes reported by the remote lobby and relay services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceReason {
    NotFound,
    Forbidden,
    SessionFull,
    InvalidJoinCode,
    Conflict,
    InvalidArgument,
    RateLimited,
    Unavailable,
}

impl fmt::Display for ServiceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceReason::NotFound => "NotFound",
            ServiceReason::Forbidden => "Forbidden",
            ServiceReason::SessionFull => "SessionFull",
            ServiceReason::InvalidJoinCode => "InvalidJoinCode",
            ServiceReason::Conflict => "Conflict",
            ServiceReason::InvalidArgument => "InvalidArgument",
            ServiceReason::RateLimited => "RateLimited",
            ServiceReason::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

/// Failure reported by a remote service call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct ServiceError {
    pub reason: ServiceReason,
    pub message: String,
}

impl ServiceError {
    pub fn new(reason: ServiceReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceReason::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ServiceReason::Forbidden, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ServiceReason::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceReason::Unavailable, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_translation_keeps_reason_verbatim() {
        let error: SessionError = ServiceError::new(ServiceReason::SessionFull, "lobby is full").into();
        assert_eq!(
            error,
            SessionError::SessionFull {
                reason: "lobby is full".to_string()
            }
        );

        let error: SessionError = ServiceError::new(ServiceReason::InvalidJoinCode, "bad code").into();
        assert!(matches!(error, SessionError::NotFound { .. }));

        let error: SessionError = ServiceError::new(ServiceReason::RateLimited, "slow down").into();
        assert!(matches!(error, SessionError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_relay_translation() {
        let error = SessionError::from_relay(ServiceError::not_found("join code expired"));
        assert_eq!(
            error,
            SessionError::InvalidCode {
                reason: "join code expired".to_string()
            }
        );

        let error = SessionError::from_relay(ServiceError::unavailable("relay down"));
        assert!(matches!(error, SessionError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_downcast_from_anyhow() {
        let error: anyhow::Error = SessionError::NoActiveSession.into();
        assert_eq!(session_error(&error), Some(&SessionError::NoActiveSession));
    }
}
