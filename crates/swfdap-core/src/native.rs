//! The native debugger interface the adapter is written against.
//!
//! Calls are synchronous and may block on the runtime connection; async
//! callers are expected to move them onto a blocking thread. Every call
//! that addresses an execution context takes its [`ContextId`], so the
//! main context and workers share one surface.

use std::path::PathBuf;
use std::sync::Arc;

use swfdap_platform::{DebuggeeProcess, ProcessLauncher};

use crate::error::NativeError;
use crate::event::NativeEvent;
use crate::types::{
    ContextId, FaultInfo, FileId, Frame, Location, SourceFile, SuspendReason, Value, ValueId,
    ValueKind, Variable,
};

/// Launch parameters for AIR application descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirLaunchInfo {
    pub profile: Option<String>,
    pub screen_size: Option<String>,
    pub screen_dpi: Option<u32>,
    pub version_platform: Option<String>,
    pub extdir: Option<String>,
    pub root_directory: Option<PathBuf>,
    pub application_args: Vec<String>,
}

/// What to start: a SWF path/URL or an AIR application descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchTarget {
    pub uri: String,
    pub air: Option<AirLaunchInfo>,
}

/// A runtime the native debugger knows how to start for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Executable path, when the runtime is a plain executable.
    pub path: Option<PathBuf>,
}

/// Creates debug sessions by launching, connecting or accepting.
pub trait SessionManager: Send + Sync {
    fn start_listening(&self) -> Result<(), NativeError>;
    fn stop_listening(&self) -> Result<(), NativeError>;

    /// Whether this manager can start the runtime itself.
    fn supports_launch(&self) -> bool;

    /// The runtime that would be used for `target`, if one can be found.
    fn find_runtime(&self, target: &LaunchTarget) -> Option<RuntimeInfo>;

    /// Starts the runtime with debugging enabled and waits for it to
    /// connect back.
    fn launch(
        &self,
        target: &LaunchTarget,
        launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Arc<dyn NativeSession>, NativeError>;

    /// Starts the runtime without a debugger attached.
    fn launch_for_run(
        &self,
        target: &LaunchTarget,
        launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Box<dyn DebuggeeProcess>, NativeError>;

    /// Connects to a runtime listening on `port`.
    fn connect(&self, port: u16) -> Result<Arc<dyn NativeSession>, NativeError>;

    /// Waits for a runtime to connect.
    fn accept(&self) -> Result<Arc<dyn NativeSession>, NativeError>;
}

/// A live connection to one runtime.
pub trait NativeSession: Send + Sync {
    /// Completes the handshake. Fails with `VersionMismatch` when the
    /// runtime speaks an incompatible protocol.
    fn bind(&self) -> Result<(), NativeError>;

    /// Ends the session and the runtime. Never fails.
    fn terminate(&self);

    // -- execution control -------------------------------------------------

    fn is_suspended(&self, context: ContextId) -> Result<bool, NativeError>;
    fn suspend_reason(&self, context: ContextId) -> Result<SuspendReason, NativeError>;
    fn suspend(&self, context: ContextId) -> Result<(), NativeError>;
    fn resume(&self, context: ContextId) -> Result<(), NativeError>;
    fn step_over(&self, context: ContextId) -> Result<(), NativeError>;
    fn step_into(&self, context: ContextId) -> Result<(), NativeError>;
    fn step_out(&self, context: ContextId) -> Result<(), NativeError>;

    // -- introspection -----------------------------------------------------

    /// Call stack of a suspended context, innermost frame first.
    fn frames(&self, context: ContextId) -> Result<Vec<Frame>, NativeError>;
    fn frame_arguments(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError>;
    fn frame_locals(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError>;
    fn frame_this(&self, context: ContextId, frame: usize) -> Result<Option<Variable>, NativeError>;
    /// Lexical scope objects of a frame, innermost first.
    fn frame_scope_chain(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError>;

    fn value(&self, context: ContextId, id: ValueId) -> Result<Option<Value>, NativeError>;
    fn members(&self, context: ContextId, id: ValueId) -> Result<Vec<Variable>, NativeError>;
    fn global(&self, context: ContextId, name: &str) -> Result<Option<Value>, NativeError>;

    /// Writes `text` interpreted as `kind` into `variable`. A runtime error
    /// raised by the assignment is returned as `Ok(Some(fault))`.
    fn set_value(
        &self,
        context: ContextId,
        variable: &Variable,
        kind: ValueKind,
        text: &str,
    ) -> Result<Option<FaultInfo>, NativeError>;

    // -- scripts and breakpoints -------------------------------------------

    /// Script files currently loaded in a context.
    fn source_files(&self, context: ContextId) -> Result<Vec<SourceFile>, NativeError>;

    /// Sets a breakpoint. `Ok(None)` means the runtime could not resolve
    /// the line. The returned location carries the line actually used.
    fn set_breakpoint(
        &self,
        context: ContextId,
        file_id: FileId,
        line: u32,
    ) -> Result<Option<Location>, NativeError>;
    fn clear_breakpoint(&self, location: &Location) -> Result<(), NativeError>;
    /// Every breakpoint currently set, across all contexts.
    fn breakpoints(&self) -> Result<Vec<Location>, NativeError>;

    // -- events ------------------------------------------------------------

    fn event_count(&self) -> Result<usize, NativeError>;
    fn next_event(&self) -> Result<Option<NativeEvent>, NativeError>;
}
