use crate::config::Config;
use crate::error::ConfigError;

/// Checks a [`Config`] and returns every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let adapter = &config.adapter;

    if !(1..=1000).contains(&adapter.poll_interval_ms) {
        errors.push(violation(
            "adapter.poll_interval_ms",
            format!("must be 1\u{2013}1000, got {}", adapter.poll_interval_ms),
        ));
    }

    if adapter.native_timeout_ms < 100 {
        errors.push(violation(
            "adapter.native_timeout_ms",
            format!("must be \u{2265} 100, got {}", adapter.native_timeout_ms),
        ));
    }

    if adapter.source_extensions.is_empty() {
        errors.push(violation("adapter.source_extensions", "must not be empty".into()));
    }
    for ext in &adapter.source_extensions {
        if ext.is_empty() || ext.starts_with('.') {
            errors.push(violation(
                "adapter.source_extensions",
                format!("'{ext}' must be a non-empty extension without a leading dot"),
            ));
        }
    }

    if config.server.port == 0 {
        errors.push(violation("server.port", "must not be 0".into()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn violation(field: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message,
    }
}
