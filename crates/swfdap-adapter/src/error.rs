//! Adapter error types.

use thiserror::Error;

use swfdap_core::{ContextId, NativeError};
use swfdap_protocol::ProtocolError;

use crate::reference::ReferenceError;

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A native call did not return within the configured bound.
    #[error("native call timed out: {command}")]
    Timeout { command: String },

    #[error("invalid reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("no execution context with id {0}")]
    UnknownContext(ContextId),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No native session is bound yet, or it was already torn down.
    #[error("no debug session is active")]
    NoSession,

    /// Session has not been initialized yet.
    #[error("session not initialized")]
    NotInitialized,

    /// Session has already been terminated.
    #[error("session already terminated")]
    Terminated,

    #[error("request rejected: {message}")]
    Rejected { message: String },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_command() {
        let err = AdapterError::Timeout {
            command: "stepIn".into(),
        };
        assert_eq!(err.to_string(), "native call timed out: stepIn");
    }

    #[test]
    fn native_error_is_transparent() {
        let err: AdapterError = NativeError::NotSuspended(2).into();
        assert_eq!(err.to_string(), "context 2 is not suspended");
    }

    #[test]
    fn reference_error_converts() {
        let err: AdapterError = ReferenceError::Negative(-3).into();
        assert!(matches!(err, AdapterError::Reference(_)));
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn lifecycle_errors_display() {
        assert_eq!(
            AdapterError::NotInitialized.to_string(),
            "session not initialized"
        );
        assert_eq!(
            AdapterError::Terminated.to_string(),
            "session already terminated"
        );
    }
}
