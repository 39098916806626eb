use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("validation error: {field}: {message}")]
    Validation {
        /// Dotted field path, e.g. `adapter.poll_interval_ms`.
        field: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_contains_field_and_message() {
        let err = ConfigError::Validation {
            field: "adapter.poll_interval_ms".into(),
            message: "must be between 1 and 1000".into(),
        };
        assert_eq!(
            err.to_string(),
            "validation error: adapter.poll_interval_ms: must be between 1 and 1000"
        );
    }

    #[test]
    fn not_found_display_contains_path() {
        let err = ConfigError::NotFound(PathBuf::from("/etc/swfdap.toml"));
        assert!(err.to_string().contains("/etc/swfdap.toml"));
    }

    #[test]
    fn io_error_converts() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::from(inner);
        assert!(err.to_string().contains("denied"));
    }
}
