//! State shared by request handlers and the event loop.

use std::sync::Arc;

use swfdap_core::NativeSession;
use swfdap_platform::DebuggeeProcess;
use swfdap_protocol::SourceBreakpoint;

use crate::breakpoint::{BreakpointBatch, BreakpointReconciler};
use crate::context::ContextTable;
use crate::emitter::EventEmitter;
use crate::source::SourceMapper;

/// Everything mutable about one debug session. Lives behind a single
/// `tokio::sync::Mutex`; the event loop holds it for one iteration at a
/// time.
pub struct SessionState {
    pub native: Option<Arc<dyn NativeSession>>,
    pub contexts: ContextTable,
    pub breakpoints: BreakpointReconciler,
    pub sources: SourceMapper,
    /// The one-time `initialized` event was sent.
    pub initialized: bool,
    pub configuration_done: bool,
    /// Path and load index of the first script module seen.
    pub main_module: Option<(String, u32)>,
    /// Runtime started without a debugger (`noDebug`).
    pub process: Option<Box<dyn DebuggeeProcess>>,
    /// Device platform and port forwarded for an attach.
    pub forwarded_port: Option<(String, u16)>,
    pub terminated: bool,
}

impl SessionState {
    pub fn new(breakpoints: BreakpointReconciler, sources: SourceMapper) -> Self {
        Self {
            native: None,
            contexts: ContextTable::default(),
            breakpoints,
            sources,
            initialized: false,
            configuration_done: false,
            main_module: None,
            process: None,
            forwarded_port: None,
            terminated: false,
        }
    }

    /// Applies one client `setBreakpoints` batch. Native diagnostics go to
    /// the stderr channel.
    pub fn set_breakpoints(
        &mut self,
        path: &str,
        requested: &[SourceBreakpoint],
        emitter: &EventEmitter,
    ) -> BreakpointBatch {
        let workers = self.contexts.worker_ids();
        let native = self.native.clone();
        let batch = self.breakpoints.set_breakpoints(
            native.as_deref(),
            &workers,
            &self.sources,
            path,
            requested,
        );
        for diagnostic in &batch.diagnostics {
            emitter.error_output(format!("{diagnostic}\n"));
        }
        batch
    }

    /// Retries pending breakpoints and announces the ones that changed.
    pub fn refresh_pending(&mut self, emitter: &EventEmitter) {
        if !self.breakpoints.has_pending() {
            return;
        }
        let workers = self.contexts.worker_ids();
        let native = self.native.clone();
        let refresh = self
            .breakpoints
            .refresh_pending(native.as_deref(), &workers, &self.sources);
        for diagnostic in refresh.diagnostics {
            emitter.error_output(format!("{diagnostic}\n"));
        }
        for breakpoint in refresh.changed {
            emitter.breakpoint_changed(breakpoint);
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(BreakpointReconciler::default(), SourceMapper::default())
    }
}
