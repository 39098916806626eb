use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Debug session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Delay between two passes of the session event loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for native calls that may block on the runtime
    /// (continue, step, pause, evaluate).
    #[serde(default = "default_native_timeout_ms")]
    pub native_timeout_ms: u64,
    /// Source file extensions, without the dot, that accept breakpoints.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
    /// Base directory for relative `program`, `extdir` and
    /// `rootDirectory` launch arguments.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    /// SDK root used to map framework source paths onto local files.
    #[serde(default)]
    pub sdk_home: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_native_timeout_ms() -> u64 {
    10_000
}

fn default_source_extensions() -> Vec<String> {
    vec!["as".to_string(), "mxml".to_string(), "hx".to_string()]
}

impl AdapterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn native_timeout(&self) -> Duration {
        Duration::from_millis(self.native_timeout_ms)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            native_timeout_ms: default_native_timeout_ms(),
            source_extensions: default_source_extensions(),
            workspace: None,
            sdk_home: None,
        }
    }
}

/// TCP server mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port used by `--server` when no port is given on the command line.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    4711
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file; the platform log directory is used when unset.
    pub file: Option<PathBuf>,
}

/// Top-level adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.adapter.poll_interval_ms, 50);
        assert_eq!(cfg.adapter.native_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.adapter.source_extensions, vec!["as", "mxml", "hx"]);
        assert!(cfg.adapter.workspace.is_none());
        assert!(cfg.adapter.sdk_home.is_none());
        assert_eq!(cfg.server.port, 4711);
        assert_eq!(cfg.log.level, LogLevel::Info);
        assert!(cfg.log.file.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let input = r#"
[adapter]
poll_interval_ms = 20
sdk_home = "/opt/flex"

[log]
level = "debug"
"#;
        let cfg: Config = toml::from_str(input).expect("parse toml");
        assert_eq!(cfg.adapter.poll_interval(), Duration::from_millis(20));
        assert_eq!(cfg.adapter.sdk_home, Some(PathBuf::from("/opt/flex")));
        assert_eq!(cfg.adapter.native_timeout_ms, 10_000);
        assert_eq!(cfg.log.level, LogLevel::Debug);
        assert_eq!(cfg.server.port, 4711);
    }

    #[test]
    fn serde_roundtrip_preserves_values() {
        let cfg = Config {
            adapter: AdapterConfig {
                poll_interval_ms: 10,
                native_timeout_ms: 500,
                source_extensions: vec!["as".into()],
                workspace: Some(PathBuf::from("/work")),
                sdk_home: None,
            },
            server: ServerConfig { port: 5000 },
            log: LogConfig {
                level: LogLevel::Trace,
                file: Some(PathBuf::from("/tmp/swfdap.log")),
            },
        };
        let text = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty toml");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn log_level_names() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::default().as_str(), "info");
    }
}
