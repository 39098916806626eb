use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Written to a freshly created global config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# swfdap configuration
# Uncomment and edit settings below to override defaults.

# [adapter]
# poll_interval_ms = 50
# native_timeout_ms = 10000
# source_extensions = ["as", "mxml", "hx"]
# workspace = "/path/to/workspace"
# sdk_home = "/path/to/flex-sdk"

# [server]
# port = 4711

# [log]
# level = "info"
# file = "/tmp/swfdap.log"
"#;

const PROJECT_DIR_NAME: &str = ".swfdap";

/// Loads the effective configuration.
///
/// Layers, last wins: built-in defaults, `config_dir/config.toml` (created
/// with commented defaults when missing), then the nearest
/// `.swfdap/config.toml` at or above `project_dir`. The result is
/// validated.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }
    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!(path = %global_path.display(), "created default config");
    }

    let mut config = Config::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        config = merge_configs(&config, &global_content)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!(path = %project_path.display(), "applying project config");
        let project_content = std::fs::read_to_string(&project_path)?;
        config = merge_configs(&config, &project_content)?;
    }

    validate(&config).map_err(first_violation)?;
    Ok(config)
}

/// Parses and validates a TOML string without touching the filesystem.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config).map_err(first_violation)?;
    Ok(config)
}

fn first_violation(errors: Vec<ConfigError>) -> ConfigError {
    for err in &errors {
        tracing::warn!("invalid configuration: {err}");
    }
    errors
        .into_iter()
        .next()
        .unwrap_or_else(|| ConfigError::Validation {
            field: "unknown".to_string(),
            message: "validation failed".to_string(),
        })
}

/// Walks from `start` upward looking for `.swfdap/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR_NAME).join("config.toml"))
        .find(|candidate| candidate.exists())
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}
