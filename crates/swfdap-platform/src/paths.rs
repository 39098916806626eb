use std::path::PathBuf;

use crate::error::PlatformError;

/// Standard directories used by the adapter.
pub trait PlatformPaths: Send + Sync {
    /// Returns the configuration directory (`~/.config/swfdap`).
    fn config_dir(&self) -> PathBuf;
    /// Returns the data directory (`~/.local/share/swfdap`).
    fn data_dir(&self) -> PathBuf;
    /// Returns the log directory (`<data_dir>/logs`).
    fn log_dir(&self) -> PathBuf;
    /// Returns the user's home directory.
    fn home_dir(&self) -> PathBuf;
}

/// [`PlatformPaths`] rooted at the user's home directory, resolved with
/// the `dirs` crate.
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// Resolves the home directory.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .ok_or_else(|| PlatformError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Paths rooted at an explicit directory instead of the real home.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("swfdap")
    }

    fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("swfdap")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }
}
