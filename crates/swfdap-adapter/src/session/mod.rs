//! The debug session: request dispatch and the commands that do not
//! touch a particular frame.

mod execution;
mod inspect;
mod launch;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use swfdap_config::AdapterConfig;
use swfdap_core::{ContextId, NativeSession, SessionManager};
use swfdap_platform::{DeviceTooling, NoDeviceTooling};
use swfdap_protocol::message;
use swfdap_protocol::{
    InitializeRequestArguments, Request, Response, SetBreakpointsArguments,
    SetBreakpointsResponseBody, Thread, ThreadsResponseBody,
};

use crate::breakpoint::BreakpointReconciler;
use crate::capabilities::adapter_capabilities;
use crate::emitter::EventEmitter;
use crate::error::AdapterError;
use crate::event_loop::{spawn_event_loop, spawn_run_watcher, EventLoopHandle};
use crate::expression::{BasicEvaluator, ExpressionEvaluator};
use crate::lifecycle::{Lifecycle, SessionLifecycle};
use crate::source::SourceMapper;
use crate::state::SessionState;

/// Background work that starts once the launch/attach response is out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    EventLoop,
    RunWatcher,
}

/// One debugging session between a client and a runtime.
pub struct DebugSession {
    manager: Arc<dyn SessionManager>,
    config: AdapterConfig,
    emitter: EventEmitter,
    devices: Arc<dyn DeviceTooling>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    state: Arc<Mutex<SessionState>>,
    lifecycle: SessionLifecycle,
    background: Option<EventLoopHandle>,
    deferred: Option<Deferred>,
}

impl DebugSession {
    pub fn new(manager: Arc<dyn SessionManager>, config: AdapterConfig, emitter: EventEmitter) -> Self {
        let state = SessionState::new(
            BreakpointReconciler::new(config.source_extensions.clone()),
            SourceMapper::new(config.sdk_home.clone()),
        );
        Self {
            manager,
            config,
            emitter,
            devices: Arc::new(NoDeviceTooling),
            evaluator: Arc::new(BasicEvaluator),
            state: Arc::new(Mutex::new(state)),
            lifecycle: SessionLifecycle::new(),
            background: None,
            deferred: None,
        }
    }

    pub fn with_device_tooling(mut self, devices: Arc<dyn DeviceTooling>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.state()
    }

    /// Whether the debuggee is gone, either by request or on its own.
    pub async fn is_terminated(&self) -> bool {
        self.lifecycle.is_terminated() || self.state.lock().await.terminated
    }

    /// Handles one request. Failures are reported in the response; this
    /// never fails itself.
    pub async fn handle_request(&mut self, request: &Request) -> Response {
        debug!(seq = request.seq, command = %request.command, "request");
        let result = match request.command.as_str() {
            "initialize" => self.initialize(request),
            "launch" => self.launch(request).await,
            "attach" => self.attach(request).await,
            "configurationDone" => self.configuration_done(request).await,
            "setBreakpoints" => self.set_breakpoints(request).await,
            "setExceptionBreakpoints" => Ok(Response::success::<()>(request, None)),
            "threads" => self.threads(request).await,
            "continue" | "next" | "stepIn" | "stepOut" => self.resume(request).await,
            "pause" => self.pause(request).await,
            "stackTrace" => self.stack_trace(request).await,
            "scopes" => self.scopes(request).await,
            "variables" => self.variables(request).await,
            "setVariable" => self.set_variable(request).await,
            "evaluate" => self.evaluate(request).await,
            "exceptionInfo" => self.exception_info(request).await,
            "disconnect" => self.disconnect(request).await,
            "source" => Ok(Response::error(request, message::source_not_supported())),
            other => {
                warn!(command = other, "unrecognized request");
                Ok(Response::error(request, message::unrecognized_request(other)))
            }
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(command = %request.command, error = %e, "request failed");
                Response::error(
                    request,
                    message::request_failed(&request.command, &e.to_string()),
                )
            }
        }
    }

    /// Starts the event loop (or the run-only watcher) prepared by a
    /// successful launch or attach. Call after that response was sent, so
    /// no event overtakes it.
    pub fn start_deferred_tasks(&mut self) {
        let Some(deferred) = self.deferred.take() else {
            return;
        };
        let interval = self.config.poll_interval();
        let handle = match deferred {
            Deferred::EventLoop => spawn_event_loop(
                self.state.clone(),
                self.emitter.clone(),
                self.evaluator.clone(),
                interval,
            ),
            Deferred::RunWatcher => {
                spawn_run_watcher(self.state.clone(), self.emitter.clone(), interval)
            }
        };
        self.background = Some(handle);
    }

    // -- helpers -----------------------------------------------------------

    async fn native(&self) -> Result<Arc<dyn NativeSession>, AdapterError> {
        self.state
            .lock()
            .await
            .native
            .clone()
            .ok_or(AdapterError::NoSession)
    }

    /// Runs `f` on the shared state from a blocking thread; native calls
    /// made by `f` do not stall the async workers.
    async fn with_state<T, F>(&self, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce(&mut SessionState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.state.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut guard))
            .await
            .map_err(|e| AdapterError::Join(e.to_string()))
    }

    /// Runs a native call that may block on the runtime, bounded by the
    /// configured timeout.
    async fn run_native<T, E, F>(&self, command: &str, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AdapterError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.config.native_timeout(), task).await {
            Ok(Ok(result)) => result.map_err(Into::into),
            Ok(Err(e)) => Err(AdapterError::Join(e.to_string())),
            Err(_) => {
                warn!(command, timeout_ms = self.config.native_timeout_ms, "native call timed out");
                Err(AdapterError::Timeout {
                    command: command.to_string(),
                })
            }
        }
    }

    // -- commands ----------------------------------------------------------

    fn initialize(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: InitializeRequestArguments = request.parse_arguments()?;
        info!(
            client = args.client_name.as_deref().unwrap_or("unknown"),
            adapter = args.adapter_id.as_deref().unwrap_or("unknown"),
            "initialize"
        );
        self.lifecycle.initialize()?;
        Ok(Response::success(request, Some(adapter_capabilities())))
    }

    async fn configuration_done(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let emitter = self.emitter.clone();
        self.with_state(move |state| {
            state.refresh_pending(&emitter);
            if let Some(native) = state.native.clone() {
                if state.contexts.main().suspended {
                    match native.resume(swfdap_core::MAIN_CONTEXT) {
                        Ok(()) => state.contexts.main_mut().mark_running(),
                        Err(e) => {
                            warn!(error = %e, "failed to resume after configuration");
                            emitter.error_output(format!("Exception in debugger: {e}\n"));
                        }
                    }
                }
            }
            state.contexts.main_mut().waiting_for_resume = false;
            state.configuration_done = true;
        })
        .await?;
        Ok(Response::success::<()>(request, None))
    }

    async fn set_breakpoints(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: SetBreakpointsArguments = request.parse_arguments()?;
        let Some(path) = args.source.path.clone() else {
            return Ok(Response::failure(request, "Breakpoint source has no path"));
        };
        let requested = args.breakpoints.unwrap_or_default();
        let emitter = self.emitter.clone();
        let batch = self
            .with_state(move |state| state.set_breakpoints(&path, &requested, &emitter))
            .await?;
        Ok(Response::success(
            request,
            Some(SetBreakpointsResponseBody {
                breakpoints: batch.breakpoints,
            }),
        ))
    }

    async fn threads(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let state = self.state.lock().await;
        let mut threads = vec![Thread {
            id: 0,
            name: "Main SWF".to_string(),
        }];
        threads.extend(state.contexts.worker_ids().into_iter().map(|id| Thread {
            id: i64::from(id),
            name: format!("Worker {id}"),
        }));
        Ok(Response::success(request, Some(ThreadsResponseBody { threads })))
    }

    async fn disconnect(&mut self, request: &Request) -> Result<Response, AdapterError> {
        info!("disconnect");
        self.deferred = None;
        if let Some(handle) = self.background.take() {
            handle.shutdown(self.config.native_timeout()).await;
        }

        let (native, process, forwarded) = {
            let mut state = self.state.lock().await;
            state.terminated = true;
            (
                state.native.take(),
                state.process.take(),
                state.forwarded_port.take(),
            )
        };

        if let Some(native) = native {
            let terminate = tokio::task::spawn_blocking(move || native.terminate());
            if tokio::time::timeout(self.config.native_timeout(), terminate)
                .await
                .is_err()
            {
                warn!("native session did not terminate in time");
            }
        }
        if let Some(mut process) = process {
            if let Err(e) = process.terminate() {
                warn!(error = %e, "failed to terminate runtime process");
            }
        }
        if let Some((platform, port)) = forwarded {
            self.release_port(&platform, port).await;
        }

        self.lifecycle.terminate();
        Ok(Response::success::<()>(request, None))
    }

    async fn release_port(&self, platform: &str, port: u16) {
        let devices = self.devices.clone();
        let platform = platform.to_string();
        let result =
            tokio::task::spawn_blocking(move || devices.stop_forward_port(&platform, port)).await;
        match result {
            Ok(outcome) if outcome.success => debug!(port, "port forwarding stopped"),
            Ok(outcome) => warn!(port, message = %outcome.message, "failed to stop port forwarding"),
            Err(e) => warn!(port, error = %e, "failed to stop port forwarding"),
        }
    }
}

/// The context a protocol thread id designates, if it is live.
fn context_id(thread_id: i64) -> Option<ContextId> {
    ContextId::try_from(thread_id).ok()
}
