//! Log file helpers.
//!
//! The `tracing-subscriber` setup lives in the binary; this module only
//! resolves where the log goes, keeps it bounded and maps level names.
//! Logs never go to stdout because stdio mode carries the protocol there.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Size at which the log file is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files kept.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

const LOG_FILE_NAME: &str = "swfdap.log";

/// Log file inside a log directory.
pub fn log_file_in(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Platform default log file path, used when no log directory is known.
///
/// * macOS: `$HOME/Library/Logs/swfdap/swfdap.log`
/// * Linux: `$HOME/.local/share/swfdap/logs/swfdap.log`
/// * Windows: `%APPDATA%/swfdap/logs/swfdap.log`
/// * Fallback: `<tmp>/swfdap/swfdap.log`
pub fn default_log_file_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Logs/swfdap").join(LOG_FILE_NAME);
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".local/share/swfdap/logs")
                .join(LOG_FILE_NAME);
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("swfdap\\logs").join(LOG_FILE_NAME);
        }
    }
    std::env::temp_dir().join("swfdap").join(LOG_FILE_NAME)
}

/// Creates the parent directory of `log_path` if needed.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.exists() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Rotates `log_path` once it reaches `max_size` bytes:
/// `swfdap.log` becomes `swfdap.log.1`, older files shift up by one and
/// `swfdap.log.<max_files>` is dropped.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let Ok(metadata) = fs::metadata(log_path) else {
        return Ok(());
    };
    if metadata.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))
}

/// Maps a level name (any case) to a `tracing` filter directive.
/// Unknown names fall back to `"info"`.
pub fn log_level_to_filter(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}
