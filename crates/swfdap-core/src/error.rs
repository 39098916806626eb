use thiserror::Error;

use swfdap_platform::PlatformError;

use crate::types::ContextId;

/// Errors reported by the native debugger.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The runtime connection is gone. Ends the debug session.
    #[error("not connected to the runtime")]
    NotConnected,

    #[error("context {0} is not suspended")]
    NotSuspended(ContextId),

    #[error("context {0} does not exist")]
    NoSuchContext(ContextId),

    /// The runtime did not answer in time.
    #[error("no response from the runtime")]
    NoResponse,

    /// Another native command is still executing.
    #[error("a native command is already in progress")]
    InProgress,

    #[error("runtime version mismatch: {0}")]
    VersionMismatch(String),

    /// The runtime process failed to start or exited during launch.
    #[error("launch failed: {message}")]
    Launch {
        exit_code: Option<i32>,
        message: String,
        /// Captured process output, if any.
        output: String,
    },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NativeError {
    /// Whether the error means the runtime connection is lost for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, NativeError::NotConnected)
    }
}
