//! swfdap-platform — host services used by the adapter: standard
//! directories, runtime process launching and the mobile device tooling
//! boundary.

pub mod device;
pub mod error;
pub mod launcher;
pub mod paths;

pub use device::{DeviceCommandResult, DeviceTooling, NoDeviceTooling};
pub use error::PlatformError;
pub use launcher::{CommandLauncher, DebuggeeProcess, ProcessLauncher};
pub use paths::{DefaultPaths, PlatformPaths};
