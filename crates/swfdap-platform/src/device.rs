//! Boundary to mobile device tooling (install, launch, port forwarding).
//!
//! Only the interface lives here. Concrete tooling is supplied by the
//! embedder; the shipped binary uses [`NoDeviceTooling`].

use std::path::Path;

pub const PLATFORM_IOS: &str = "ios";
pub const PLATFORM_IOS_SIMULATOR: &str = "ios_simulator";
pub const PLATFORM_ANDROID: &str = "android";

/// Outcome of one device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommandResult {
    pub success: bool,
    /// Diagnostic text, shown to the user on failure.
    pub message: String,
}

impl DeviceCommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub trait DeviceTooling: Send + Sync {
    fn uninstall(&self, platform: &str, app_id: &str, platform_sdk: Option<&Path>)
        -> DeviceCommandResult;

    fn install(&self, platform: &str, bundle: &Path, platform_sdk: Option<&Path>)
        -> DeviceCommandResult;

    fn launch(&self, platform: &str, app_id: &str, platform_sdk: Option<&Path>)
        -> DeviceCommandResult;

    fn forward_port(&self, platform: &str, port: u16) -> DeviceCommandResult;

    /// Best effort; failures are only logged by callers.
    fn stop_forward_port(&self, platform: &str, port: u16) -> DeviceCommandResult;
}

/// Device tooling for hosts without any mobile SDK configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeviceTooling;

impl NoDeviceTooling {
    fn unavailable(action: &str, platform: &str) -> DeviceCommandResult {
        DeviceCommandResult::failed(format!(
            "{action} failed for platform \"{platform}\": device tooling is not available"
        ))
    }
}

impl DeviceTooling for NoDeviceTooling {
    fn uninstall(&self, platform: &str, _app_id: &str, _sdk: Option<&Path>) -> DeviceCommandResult {
        Self::unavailable("Device uninstall", platform)
    }

    fn install(&self, platform: &str, _bundle: &Path, _sdk: Option<&Path>) -> DeviceCommandResult {
        Self::unavailable("Installing app on device", platform)
    }

    fn launch(&self, platform: &str, _app_id: &str, _sdk: Option<&Path>) -> DeviceCommandResult {
        Self::unavailable("Launching app on device", platform)
    }

    fn forward_port(&self, platform: &str, _port: u16) -> DeviceCommandResult {
        Self::unavailable("Forwarding port for debugging", platform)
    }

    fn stop_forward_port(&self, platform: &str, _port: u16) -> DeviceCommandResult {
        Self::unavailable("Stopping port forwarding", platform)
    }
}
