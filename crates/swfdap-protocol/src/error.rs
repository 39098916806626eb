//! Wire-level error types.

use thiserror::Error;

/// Errors raised while reading or writing protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying stream failed.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing was malformed or incomplete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The message body was not valid JSON or not a valid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Request arguments did not match the command's schema.
    #[error("invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },
}
