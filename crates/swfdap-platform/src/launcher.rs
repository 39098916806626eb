//! Runtime process launching.
//!
//! The native debugger builds the runtime command line itself; a
//! [`ProcessLauncher`] decides how that command line is turned into a
//! running process. [`CommandLauncher`] substitutes a user-supplied runtime
//! executable, extra runtime arguments and environment.

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::PlatformError;

/// A spawned runtime process.
pub trait DebuggeeProcess: Send {
    /// Returns the exit code once the process has exited, `None` while it
    /// is still running. A process killed by a signal reports `-1`.
    fn try_exit_code(&mut self) -> Result<Option<i32>, PlatformError>;

    /// Forcibly terminates the process.
    fn terminate(&mut self) -> Result<(), PlatformError>;
}

impl DebuggeeProcess for Child {
    fn try_exit_code(&mut self) -> Result<Option<i32>, PlatformError> {
        Ok(self.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    fn terminate(&mut self) -> Result<(), PlatformError> {
        match self.kill() {
            Ok(()) => Ok(()),
            // Already exited.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Spawns a runtime from a command line prepared by the native debugger.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &[String]) -> Result<Box<dyn DebuggeeProcess>, PlatformError>;
}

/// Launches a specific runtime executable instead of the one the native
/// debugger would pick.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLauncher {
    runtime_executable: String,
    runtime_args: Vec<String>,
    env: HashMap<String, String>,
    is_air: bool,
}

impl CommandLauncher {
    pub fn new(runtime_executable: impl Into<String>) -> Self {
        Self {
            runtime_executable: runtime_executable.into(),
            runtime_args: Vec::new(),
            env: HashMap::new(),
            is_air: false,
        }
    }

    pub fn with_runtime_args(mut self, args: Vec<String>) -> Self {
        self.runtime_args = args;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// AIR command lines start with the launcher path itself, which is
    /// replaced by the runtime executable.
    pub fn for_air(mut self, is_air: bool) -> Self {
        self.is_air = is_air;
        self
    }

    pub fn runtime_executable(&self) -> &str {
        &self.runtime_executable
    }

    /// The full argument vector passed to the operating system, runtime
    /// executable first.
    pub fn command_line(&self, command: &[String]) -> Vec<String> {
        let passthrough = if self.is_air && !command.is_empty() {
            &command[1..]
        } else {
            command
        };
        let mut line = Vec::with_capacity(1 + passthrough.len() + self.runtime_args.len());
        line.push(self.runtime_executable.clone());
        line.extend(passthrough.iter().cloned());
        line.extend(self.runtime_args.iter().cloned());
        line
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, command: &[String]) -> Result<Box<dyn DebuggeeProcess>, PlatformError> {
        let line = self.command_line(command);
        let (program, args) = line.split_first().ok_or(PlatformError::EmptyCommand)?;
        debug!(program = %program, args = ?args, "spawning runtime");
        let child = Command::new(program)
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!(program = %program, error = %e, "runtime spawn failed");
                PlatformError::ProcessSpawn(e)
            })?;
        Ok(Box::new(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_line_prepends_runtime_and_appends_runtime_args() {
        let launcher = CommandLauncher::new("/opt/flashplayer")
            .with_runtime_args(cmd(&["--fullscreen"]));
        assert_eq!(
            launcher.command_line(&cmd(&["/work/Main.swf"])),
            cmd(&["/opt/flashplayer", "/work/Main.swf", "--fullscreen"])
        );
    }

    #[test]
    fn air_command_line_drops_native_launcher_path() {
        let launcher = CommandLauncher::new("/sdk/bin/adl").for_air(true);
        assert_eq!(
            launcher.command_line(&cmd(&["adl", "-profile", "desktop", "app.xml"])),
            cmd(&["/sdk/bin/adl", "-profile", "desktop", "app.xml"])
        );
    }

    #[test]
    fn air_command_line_with_empty_command() {
        let launcher = CommandLauncher::new("/sdk/bin/adl").for_air(true);
        assert_eq!(launcher.command_line(&[]), cmd(&["/sdk/bin/adl"]));
    }

    #[test]
    fn launch_missing_executable_fails() {
        let launcher = CommandLauncher::new("/definitely/not/a/runtime");
        let err = launcher.launch(&cmd(&["Main.swf"])).err().expect("spawn should fail");
        assert!(matches!(err, PlatformError::ProcessSpawn(_)));
    }

    #[cfg(unix)]
    #[test]
    fn launched_process_reports_exit_code() {
        let launcher = CommandLauncher::new("/bin/sh");
        let mut process = launcher
            .launch(&cmd(&["-c", "exit 3"]))
            .expect("spawn /bin/sh");
        let mut code = None;
        for _ in 0..200 {
            code = process.try_exit_code().unwrap();
            if code.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn terminate_running_process() {
        let launcher = CommandLauncher::new("/bin/sh");
        let mut process = launcher
            .launch(&cmd(&["-c", "sleep 30"]))
            .expect("spawn /bin/sh");
        process.terminate().unwrap();
        let mut code = None;
        for _ in 0..200 {
            code = process.try_exit_code().unwrap();
            if code.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(code.is_some());
    }
}
