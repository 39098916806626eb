use thiserror::Error;

/// Errors that can occur during platform operations.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("path error: {0}")]
    Path(String),

    #[error("process spawn failed: {0}")]
    ProcessSpawn(#[from] std::io::Error),

    #[error("empty command line for runtime launcher")]
    EmptyCommand,

    #[error("unsupported operation on {platform}: {detail}")]
    Unsupported { platform: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_error_display_contains_message() {
        let err = PlatformError::Path("bad path".into());
        assert!(err.to_string().contains("path error"));
        assert!(err.to_string().contains("bad path"));
    }

    #[test]
    fn unsupported_error_display_contains_platform_and_detail() {
        let err = PlatformError::Unsupported {
            platform: "ios".into(),
            detail: "no device tooling".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ios"));
        assert!(msg.contains("no device tooling"));
    }

    #[test]
    fn process_spawn_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "adl not found");
        let err = PlatformError::from(io_err);
        assert!(err.to_string().contains("adl not found"));
    }

    #[test]
    fn empty_command_display() {
        assert_eq!(
            PlatformError::EmptyCommand.to_string(),
            "empty command line for runtime launcher"
        );
    }
}
