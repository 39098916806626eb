mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use swfdap_config::{load_config, Config};
use swfdap_core::logging::{
    ensure_log_dir, log_file_in, log_level_to_filter, rotate_log_files, DEFAULT_MAX_LOG_FILES,
    DEFAULT_MAX_LOG_SIZE,
};
use swfdap_core::Scenario;
use swfdap_platform::paths::{DefaultPaths, PlatformPaths};

use crate::server::{scenario_factory, serve_stdio, serve_tcp, unavailable_factory, ManagerFactory};

/// Debug Adapter Protocol server for SWF debugging.
#[derive(Debug, Parser)]
#[command(name = "swfdap", version)]
struct Cli {
    /// Listen for clients on a TCP port instead of using stdin/stdout.
    /// Without a value the configured port is used.
    #[arg(long, value_name = "PORT", num_args = 0..=1)]
    server: Option<Option<u16>>,

    /// Directory holding config.toml.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Serve a simulated runtime described by a JSON scenario file.
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Port to listen on, or `None` for stdio mode.
    fn server_port(&self, config: &Config) -> Option<u16> {
        self.server.map(|port| port.unwrap_or(config.server.port))
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;

    // Load configuration first so we can honour log settings.
    let config_dir = cli.config_dir.clone().unwrap_or_else(|| paths.config_dir());
    let project_dir = std::env::current_dir().ok();
    let (config, config_error) = match load_config(&config_dir, project_dir.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(|| log_file_in(&paths.log_dir()));
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.log.level.as_str());
    init_logging(&log_path, log_level_to_filter(level));

    info!(version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "swfdap starting");
    if let Some(e) = config_error {
        warn!(error = %e, dir = %config_dir.display(), "invalid configuration, using defaults");
    }

    let factory = manager_factory(cli.scenario.as_deref())?;
    let port = cli.server_port(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match port {
            Some(port) => serve_tcp(port, factory, config.adapter).await,
            None => serve_stdio(factory, config.adapter).await,
        }
    })
}

/// Logs go to a file, or stderr when it cannot be opened. stdout carries
/// the protocol in stdio mode.
fn init_logging(log_path: &Path, default_filter: &str) {
    ensure_log_dir(log_path).ok();
    rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        Ok(log_file) => tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .with_env_filter(env_filter)
            .init(),
        Err(e) => {
            eprintln!("swfdap: cannot open log file {}: {e}", log_path.display());
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_env_filter(env_filter)
                .init();
        }
    }
}

fn manager_factory(scenario: Option<&Path>) -> Result<ManagerFactory> {
    let Some(path) = scenario else {
        warn!("no scenario given; launch and attach requests will fail");
        return Ok(unavailable_factory());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let scenario = Scenario::from_json(&text)
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;
    info!(path = %path.display(), contexts = scenario.contexts.len(), "loaded scenario");
    Ok(scenario_factory(scenario))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("swfdap: {:#}", e);
        std::process::exit(1);
    }
}
