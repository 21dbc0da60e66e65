//! Unified error handling for veilbot.
//!
//! Every user-facing handler either completes a coherent state transition or
//! reports exactly one notice; nothing propagates past the dispatcher
//! boundary. `RelayError` carries the handler-level kinds, with automatic
//! conversions from the store and transport layers and stable code strings
//! for log labeling.

use crate::store::StoreError;
use crate::texts;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur while handling a command or relaying a message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad input: {0}")]
    BadInput(String),

    /// Banned user action, or a non-admin invoking an admin operation.
    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition conflicts with the user's current state.
    #[error("conflicting state: {0}")]
    ConflictState(&'static str),

    #[error("rate limited")]
    RateLimited,

    #[error("waiting queue is full")]
    QueueFull,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::ConflictState(_) => "conflict_state",
            Self::RateLimited => "rate_limited",
            Self::QueueFull => "queue_full",
            Self::Store(_) => "store_unavailable",
            Self::Transport(_) => "transport",
        }
    }

    /// The single user-visible notice for this error.
    ///
    /// Returns `None` for transport failures: the router already reacted to
    /// those (retry, or pair break plus sender notice), so the dispatcher
    /// only logs them.
    pub fn user_notice(&self) -> Option<String> {
        match self {
            Self::BadInput(detail) => Some(format!("{} {}", texts::BAD_INPUT, detail)),
            Self::Forbidden => Some(texts::FORBIDDEN.to_string()),
            Self::NotFound(detail) => Some(detail.clone()),
            Self::ConflictState(detail) => Some((*detail).to_string()),
            Self::RateLimited => Some(texts::RATE_LIMITED.to_string()),
            Self::QueueFull => Some(texts::QUEUE_FULL.to_string()),
            Self::Store(_) => Some(texts::SERVICE_UNAVAILABLE.to_string()),
            Self::Transport(_) => None,
        }
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RelayError::Forbidden.error_code(), "forbidden");
        assert_eq!(RelayError::RateLimited.error_code(), "rate_limited");
        assert_eq!(RelayError::BadInput("x".into()).error_code(), "bad_input");
    }

    #[test]
    fn test_store_error_maps_to_generic_notice() {
        let err = RelayError::Store(StoreError::Closed);
        assert_eq!(
            err.user_notice().as_deref(),
            Some(texts::SERVICE_UNAVAILABLE)
        );
    }

    #[test]
    fn test_transport_error_has_no_notice() {
        let err = RelayError::Transport(TransportError::Transient("timeout".into()));
        assert!(err.user_notice().is_none());
    }
}
