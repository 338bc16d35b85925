use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ConnectionState;

/// Broad error category used for logging and rollback decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid configuration.
    Config,
    /// Session expired or CSRF rejected.
    Auth,
    /// Transient network or transport failure.
    Network,
    /// Server asked the client to slow down.
    RateLimited,
    /// Payload could not be encoded or decoded.
    Serialization,
    /// Server answered with an unexpected application-level status.
    Protocol,
    /// Client bug or invariant break.
    Internal,
}

/// Stable client error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ClientError {
    pub category: ErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    pub message: String,
}

impl ClientError {
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: ConnectionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while connection is {current:?}"),
        )
    }

    /// Build the error reported for a malformed push payload.
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Serialization, "malformed_push_payload", message)
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Network | ErrorCategory::RateLimited
        )
    }
}

/// Map HTTP status codes to client error categories.
pub fn classify_http_status(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Auth,
        408 | 429 => ErrorCategory::RateLimited,
        400..=499 => ErrorCategory::Config,
        500..=599 => ErrorCategory::Network,
        _ => ErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(403), ErrorCategory::Auth);
        assert_eq!(classify_http_status(429), ErrorCategory::RateLimited);
        assert_eq!(classify_http_status(400), ErrorCategory::Config);
        assert_eq!(classify_http_status(502), ErrorCategory::Network);
        assert_eq!(classify_http_status(700), ErrorCategory::Internal);
    }

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = ClientError::invalid_state(ConnectionState::Disconnected, "connect");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, ErrorCategory::Internal);
        assert!(err.message.contains("Disconnected"));
    }

    #[test]
    fn only_network_and_rate_limit_are_transient() {
        let network = ClientError::new(ErrorCategory::Network, "n", "down");
        let auth = ClientError::new(ErrorCategory::Auth, "a", "csrf");
        assert!(network.is_transient());
        assert!(!auth.is_transient());
    }
}
