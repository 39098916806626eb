//! An in-memory runtime implementing the native debugger interface.
//!
//! [`SimulatedSession`] keeps contexts, frames, objects and a breakpoint
//! table in memory and replays scripted halts whenever a context resumes.
//! It backs the adapter's tests and the binary's `--scenario` mode, where a
//! [`Scenario`] is loaded from JSON.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use swfdap_platform::{DebuggeeProcess, PlatformError, ProcessLauncher};

use crate::error::NativeError;
use crate::event::NativeEvent;
use crate::native::{LaunchTarget, NativeSession, RuntimeInfo, SessionManager};
use crate::types::{
    ContextId, FaultInfo, FileId, Frame, Location, SourceFile, SuspendReason, Value, ValueId,
    ValueKind, Variable, VariableOwner, MAIN_CONTEXT,
};

// ---------------------------------------------------------------------------
// Scenario description
// ---------------------------------------------------------------------------

/// A script file with its executable lines. An empty line list accepts a
/// breakpoint on any line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFile {
    pub file: SourceFile,
    #[serde(default)]
    pub lines: Vec<u32>,
}

impl SimFile {
    pub fn new(id: FileId, full_path: &str) -> Self {
        let name = Path::new(full_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| full_path.to_string());
        Self {
            file: SourceFile {
                id,
                name,
                full_path: full_path.to_string(),
            },
            lines: Vec::new(),
        }
    }

    pub fn with_lines(mut self, lines: &[u32]) -> Self {
        self.lines = lines.to_vec();
        self
    }

    fn resolve_line(&self, line: u32) -> Option<u32> {
        if self.lines.is_empty() {
            return Some(line);
        }
        self.lines.iter().copied().filter(|l| *l >= line).min()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    pub frame: Frame,
    #[serde(default)]
    pub this: Option<Variable>,
    #[serde(default)]
    pub arguments: Vec<Variable>,
    #[serde(default)]
    pub locals: Vec<Variable>,
    #[serde(default)]
    pub scope_chain: Vec<Variable>,
}

impl SimFrame {
    pub fn new(call_signature: &str, location: Option<Location>) -> Self {
        Self {
            frame: Frame {
                call_signature: call_signature.to_string(),
                location,
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimContext {
    /// `Some` while the context is halted.
    #[serde(default)]
    pub suspended: Option<SuspendReason>,
    #[serde(default)]
    pub files: Vec<SimFile>,
    #[serde(default)]
    pub frames: Vec<SimFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObject {
    pub value: Value,
    #[serde(default)]
    pub members: Vec<Variable>,
}

/// State applied the next time any context resumes or steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedHalt {
    pub context_id: ContextId,
    pub reason: SuspendReason,
    #[serde(default)]
    pub events: Vec<NativeEvent>,
    #[serde(default)]
    pub frames: Option<Vec<SimFrame>>,
    #[serde(default)]
    pub files: Vec<SimFile>,
}

/// Complete initial state of a simulated runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub contexts: BTreeMap<ContextId, SimContext>,
    #[serde(default)]
    pub objects: Vec<SimObject>,
    #[serde(default)]
    pub globals: HashMap<String, Value>,
    #[serde(default)]
    pub events: Vec<NativeEvent>,
    #[serde(default)]
    pub halts: Vec<ScriptedHalt>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SimState {
    contexts: BTreeMap<ContextId, SimContext>,
    objects: HashMap<ValueId, SimObject>,
    globals: HashMap<String, Value>,
    events: VecDeque<NativeEvent>,
    halts: VecDeque<ScriptedHalt>,
    breakpoints: Vec<Location>,
    calls: Vec<String>,
    bound: bool,
    terminated: bool,
}

impl SimState {
    fn context(&self, id: ContextId) -> Result<&SimContext, NativeError> {
        self.contexts.get(&id).ok_or(NativeError::NoSuchContext(id))
    }

    fn context_mut(&mut self, id: ContextId) -> Result<&mut SimContext, NativeError> {
        self.contexts.get_mut(&id).ok_or(NativeError::NoSuchContext(id))
    }

    fn suspended_frame(&self, context: ContextId, frame: usize) -> Result<Option<&SimFrame>, NativeError> {
        let ctx = self.context(context)?;
        if ctx.suspended.is_none() {
            return Err(NativeError::NotSuspended(context));
        }
        Ok(ctx.frames.get(frame))
    }

    /// Resumes `context` and applies the next scripted halt, if any.
    fn run(&mut self, context: ContextId, call: &str) -> Result<(), NativeError> {
        let ctx = self.context_mut(context)?;
        if ctx.suspended.is_none() {
            return Err(NativeError::NotSuspended(context));
        }
        ctx.suspended = None;
        self.calls.push(format!("{call} {context}"));
        if let Some(halt) = self.halts.pop_front() {
            debug!(context = halt.context_id, reason = halt.reason.as_str(), "applying scripted halt");
            let target = self.contexts.entry(halt.context_id).or_default();
            target.suspended = Some(halt.reason);
            if let Some(frames) = halt.frames {
                target.frames = frames;
            }
            target.files.extend(halt.files);
            self.events.extend(halt.events);
        }
        Ok(())
    }

    fn find_variable_mut(
        &mut self,
        context: ContextId,
        variable: &Variable,
    ) -> Result<Option<&mut Variable>, NativeError> {
        let found = match variable.owner {
            VariableOwner::Frame(index) => {
                let ctx = self.context_mut(context)?;
                ctx.frames.get_mut(index).and_then(|frame| {
                    frame
                        .arguments
                        .iter_mut()
                        .chain(frame.locals.iter_mut())
                        .find(|v| v.name == variable.name)
                })
            }
            VariableOwner::Object(id) => self
                .objects
                .get_mut(&id)
                .and_then(|obj| obj.members.iter_mut().find(|v| v.name == variable.name)),
            VariableOwner::Global => None,
        };
        Ok(found)
    }
}

/// In-memory [`NativeSession`].
#[derive(Debug)]
pub struct SimulatedSession {
    state: Mutex<SimState>,
    connected: AtomicBool,
    call_delay: Mutex<Option<Duration>>,
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::from_scenario(Scenario::default())
    }
}

impl SimulatedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        let mut contexts = scenario.contexts;
        contexts.entry(MAIN_CONTEXT).or_default();
        let state = SimState {
            contexts,
            objects: scenario
                .objects
                .into_iter()
                .filter_map(|obj| obj.value.id.map(|id| (id, obj)))
                .collect(),
            globals: scenario.globals,
            events: scenario.events.into(),
            halts: scenario.halts.into(),
            ..SimState::default()
        };
        Self {
            state: Mutex::new(state),
            connected: AtomicBool::new(true),
            call_delay: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connected(&self) -> Result<MutexGuard<'_, SimState>, NativeError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(NativeError::NotConnected);
        }
        Ok(self.lock())
    }

    fn delay(&self) {
        let delay = *self
            .call_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }

    // -- scripting ---------------------------------------------------------

    pub fn add_context(&self, context: ContextId) {
        self.lock().contexts.entry(context).or_default();
    }

    pub fn remove_context(&self, context: ContextId) {
        self.lock().contexts.remove(&context);
    }

    pub fn add_file(&self, context: ContextId, file: SimFile) {
        self.lock().contexts.entry(context).or_default().files.push(file);
    }

    pub fn set_frames(&self, context: ContextId, frames: Vec<SimFrame>) {
        self.lock().contexts.entry(context).or_default().frames = frames;
    }

    /// Halts `context` as if the runtime had stopped it.
    pub fn halt(&self, context: ContextId, reason: SuspendReason) {
        self.lock().contexts.entry(context).or_default().suspended = Some(reason);
    }

    pub fn push_event(&self, event: NativeEvent) {
        self.lock().events.push_back(event);
    }

    pub fn add_object(&self, value: Value, members: Vec<Variable>) {
        if let Some(id) = value.id {
            self.lock().objects.insert(id, SimObject { value, members });
        }
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.lock().globals.insert(name.to_string(), value);
    }

    pub fn queue_halt(&self, halt: ScriptedHalt) {
        self.lock().halts.push_back(halt);
    }

    /// Drops the connection; every later call fails with `NotConnected`.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Makes execution-control calls block for `delay`.
    pub fn set_call_delay(&self, delay: Option<Duration>) {
        *self
            .call_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    // -- inspection --------------------------------------------------------

    /// Execution-control calls received so far, e.g. `"resume 0"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.lock().bound
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    pub fn is_halted(&self, context: ContextId) -> bool {
        self.lock()
            .contexts
            .get(&context)
            .is_some_and(|ctx| ctx.suspended.is_some())
    }

    pub fn breakpoint_locations(&self) -> Vec<Location> {
        self.lock().breakpoints.clone()
    }
}

impl NativeSession for SimulatedSession {
    fn bind(&self) -> Result<(), NativeError> {
        self.connected()?.bound = true;
        Ok(())
    }

    fn terminate(&self) {
        let mut state = self.lock();
        state.terminated = true;
        state.calls.push("terminate".to_string());
        drop(state);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_suspended(&self, context: ContextId) -> Result<bool, NativeError> {
        Ok(self.connected()?.context(context)?.suspended.is_some())
    }

    fn suspend_reason(&self, context: ContextId) -> Result<SuspendReason, NativeError> {
        Ok(self
            .connected()?
            .context(context)?
            .suspended
            .unwrap_or(SuspendReason::Unknown))
    }

    fn suspend(&self, context: ContextId) -> Result<(), NativeError> {
        self.delay();
        let mut state = self.connected()?;
        let ctx = state.context_mut(context)?;
        ctx.suspended = Some(SuspendReason::StopRequest);
        state.calls.push(format!("suspend {context}"));
        Ok(())
    }

    fn resume(&self, context: ContextId) -> Result<(), NativeError> {
        self.delay();
        self.connected()?.run(context, "resume")
    }

    fn step_over(&self, context: ContextId) -> Result<(), NativeError> {
        self.delay();
        self.connected()?.run(context, "step_over")
    }

    fn step_into(&self, context: ContextId) -> Result<(), NativeError> {
        self.delay();
        self.connected()?.run(context, "step_into")
    }

    fn step_out(&self, context: ContextId) -> Result<(), NativeError> {
        self.delay();
        self.connected()?.run(context, "step_out")
    }

    fn frames(&self, context: ContextId) -> Result<Vec<Frame>, NativeError> {
        let state = self.connected()?;
        let ctx = state.context(context)?;
        if ctx.suspended.is_none() {
            return Err(NativeError::NotSuspended(context));
        }
        Ok(ctx.frames.iter().map(|f| f.frame.clone()).collect())
    }

    fn frame_arguments(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError> {
        let state = self.connected()?;
        Ok(state
            .suspended_frame(context, frame)?
            .map(|f| owned(&f.arguments, VariableOwner::Frame(frame)))
            .unwrap_or_default())
    }

    fn frame_locals(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError> {
        let state = self.connected()?;
        Ok(state
            .suspended_frame(context, frame)?
            .map(|f| owned(&f.locals, VariableOwner::Frame(frame)))
            .unwrap_or_default())
    }

    fn frame_this(&self, context: ContextId, frame: usize) -> Result<Option<Variable>, NativeError> {
        let state = self.connected()?;
        Ok(state
            .suspended_frame(context, frame)?
            .and_then(|f| f.this.clone()))
    }

    fn frame_scope_chain(&self, context: ContextId, frame: usize) -> Result<Vec<Variable>, NativeError> {
        let state = self.connected()?;
        Ok(state
            .suspended_frame(context, frame)?
            .map(|f| f.scope_chain.clone())
            .unwrap_or_default())
    }

    fn value(&self, context: ContextId, id: ValueId) -> Result<Option<Value>, NativeError> {
        let state = self.connected()?;
        state.context(context)?;
        Ok(state.objects.get(&id).map(|obj| obj.value.clone()))
    }

    fn members(&self, context: ContextId, id: ValueId) -> Result<Vec<Variable>, NativeError> {
        let state = self.connected()?;
        state.context(context)?;
        Ok(state
            .objects
            .get(&id)
            .map(|obj| owned(&obj.members, VariableOwner::Object(id)))
            .unwrap_or_default())
    }

    fn global(&self, context: ContextId, name: &str) -> Result<Option<Value>, NativeError> {
        let state = self.connected()?;
        state.context(context)?;
        Ok(state.globals.get(name).cloned())
    }

    fn set_value(
        &self,
        context: ContextId,
        variable: &Variable,
        kind: ValueKind,
        text: &str,
    ) -> Result<Option<FaultInfo>, NativeError> {
        let new_value = match kind {
            ValueKind::Boolean => Value::boolean(text == "true"),
            ValueKind::Number => match text.parse::<f64>() {
                Ok(n) => Value::number(n),
                Err(_) => {
                    return Ok(Some(fault(format!("'{text}' is not a number"))));
                }
            },
            ValueKind::String => Value::string(text),
            other => {
                return Err(NativeError::Unsupported(format!(
                    "cannot assign values of kind {other:?}"
                )))
            }
        };
        let mut state = self.connected()?;
        if variable.owner == VariableOwner::Global {
            state.globals.insert(variable.name.clone(), new_value);
            return Ok(None);
        }
        match state.find_variable_mut(context, variable)? {
            Some(slot) if slot.attributes.read_only || slot.attributes.is_const => Ok(Some(fault(
                format!("Illegal write to read-only property {}", variable.name),
            ))),
            Some(slot) => {
                slot.value = new_value;
                Ok(None)
            }
            None => Ok(Some(fault(format!(
                "Property {} not found",
                variable.name
            )))),
        }
    }

    fn source_files(&self, context: ContextId) -> Result<Vec<SourceFile>, NativeError> {
        let state = self.connected()?;
        Ok(state
            .context(context)?
            .files
            .iter()
            .map(|f| f.file.clone())
            .collect())
    }

    fn set_breakpoint(
        &self,
        context: ContextId,
        file_id: FileId,
        line: u32,
    ) -> Result<Option<Location>, NativeError> {
        let mut state = self.connected()?;
        let resolved = state
            .context(context)?
            .files
            .iter()
            .find(|f| f.file.id == file_id)
            .and_then(|f| f.resolve_line(line).map(|l| (l, f.file.clone())));
        let Some((resolved_line, file)) = resolved else {
            return Ok(None);
        };
        let location = Location {
            context_id: context,
            file_id,
            line: resolved_line,
            file: Some(file),
        };
        if !state.breakpoints.contains(&location) {
            state.breakpoints.push(location.clone());
        }
        Ok(Some(location))
    }

    fn clear_breakpoint(&self, location: &Location) -> Result<(), NativeError> {
        self.connected()?.breakpoints.retain(|bp| {
            !(bp.context_id == location.context_id
                && bp.file_id == location.file_id
                && bp.line == location.line)
        });
        Ok(())
    }

    fn breakpoints(&self) -> Result<Vec<Location>, NativeError> {
        Ok(self.connected()?.breakpoints.clone())
    }

    fn event_count(&self) -> Result<usize, NativeError> {
        Ok(self.connected()?.events.len())
    }

    fn next_event(&self) -> Result<Option<NativeEvent>, NativeError> {
        Ok(self.connected()?.events.pop_front())
    }
}

fn owned(vars: &[Variable], owner: VariableOwner) -> Vec<Variable> {
    vars.iter().cloned().map(|v| v.owned_by(owner)).collect()
}

fn fault(message: String) -> FaultInfo {
    FaultInfo {
        message,
        stack_trace: String::new(),
        thrown: None,
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// A process handle whose exit code is fixed up front.
#[derive(Debug)]
pub struct SimulatedProcess {
    exit_code: i32,
    polls_until_exit: u32,
    terminated: Arc<AtomicBool>,
}

impl SimulatedProcess {
    /// The process exits with `exit_code` after being polled
    /// `polls_until_exit` times.
    pub fn new(exit_code: i32, polls_until_exit: u32) -> Self {
        Self {
            exit_code,
            polls_until_exit,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        self.terminated.clone()
    }
}

impl DebuggeeProcess for SimulatedProcess {
    fn try_exit_code(&mut self) -> Result<Option<i32>, PlatformError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Ok(Some(-1));
        }
        if self.polls_until_exit == 0 {
            return Ok(Some(self.exit_code));
        }
        self.polls_until_exit -= 1;
        Ok(None)
    }

    fn terminate(&mut self) -> Result<(), PlatformError> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Reproducible launch failure for [`SimulatedManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchFailure {
    pub exit_code: Option<i32>,
    pub message: String,
    pub output: String,
}

/// Hands out one shared [`SimulatedSession`] for every launch, connect or
/// accept.
pub struct SimulatedManager {
    session: Arc<SimulatedSession>,
    runtime: Option<PathBuf>,
    launch_failure: Option<LaunchFailure>,
    run_polls_until_exit: u32,
    listening: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl SimulatedManager {
    pub fn new(session: Arc<SimulatedSession>) -> Self {
        Self {
            session,
            runtime: Some(PathBuf::from("/opt/simulated/flashplayer")),
            launch_failure: None,
            run_polls_until_exit: 2,
            listening: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Runtime reported by [`SessionManager::find_runtime`]; `None` makes
    /// runtime lookup fail.
    pub fn with_runtime(mut self, runtime: Option<PathBuf>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_launch_failure(mut self, failure: LaunchFailure) -> Self {
        self.launch_failure = Some(failure);
        self
    }

    pub fn session(&self) -> Arc<SimulatedSession> {
        self.session.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Requests received so far, e.g. `"launch /work/Main.swf"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, request: String) {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
    }

    fn check_failure(&self) -> Result<(), NativeError> {
        match &self.launch_failure {
            Some(failure) => Err(NativeError::Launch {
                exit_code: failure.exit_code,
                message: failure.message.clone(),
                output: failure.output.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl SessionManager for SimulatedManager {
    fn start_listening(&self) -> Result<(), NativeError> {
        self.record("start listening".to_string());
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_listening(&self) -> Result<(), NativeError> {
        self.record("stop listening".to_string());
        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn supports_launch(&self) -> bool {
        true
    }

    fn find_runtime(&self, _target: &LaunchTarget) -> Option<RuntimeInfo> {
        self.runtime.as_ref().map(|path| RuntimeInfo {
            path: Some(path.clone()),
        })
    }

    fn launch(
        &self,
        target: &LaunchTarget,
        launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Arc<dyn NativeSession>, NativeError> {
        let via = if launcher.is_some() { " (custom runtime)" } else { "" };
        self.record(format!("launch {}{via}", target.uri));
        self.check_failure()?;
        Ok(self.session.clone())
    }

    fn launch_for_run(
        &self,
        target: &LaunchTarget,
        launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Box<dyn DebuggeeProcess>, NativeError> {
        let via = if launcher.is_some() { " (custom runtime)" } else { "" };
        self.record(format!("run {}{via}", target.uri));
        self.check_failure()?;
        Ok(Box::new(SimulatedProcess::new(0, self.run_polls_until_exit)))
    }

    fn connect(&self, port: u16) -> Result<Arc<dyn NativeSession>, NativeError> {
        self.record(format!("connect {port}"));
        Ok(self.session.clone())
    }

    fn accept(&self) -> Result<Arc<dyn NativeSession>, NativeError> {
        self.record("accept".to_string());
        Ok(self.session.clone())
    }
}
