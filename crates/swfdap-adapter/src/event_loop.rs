//! The polling loop that turns native events and suspensions into
//! protocol events.
//!
//! Each iteration clears the per-context resume flags, drains the native
//! event queue, then classifies the suspension state of the main context
//! followed by every worker in registration order. A context reported to
//! the client stays held until a request resumes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use swfdap_core::{
    ContextId, FaultInfo, FileId, NativeError, NativeEvent, NativeSession, SuspendReason,
    MAIN_CONTEXT,
};
use swfdap_protocol::{Source, StopReason};

use crate::emitter::EventEmitter;
use crate::expression::{
    display_text, interpolate_log_message, to_boolean, ExpressionEvaluator,
    NativeExpressionContext,
};
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Runs one loop iteration. Only a lost runtime connection, or the main
/// module unloading, stops the loop.
pub fn poll_once(
    state: &mut SessionState,
    emitter: &EventEmitter,
    evaluator: &dyn ExpressionEvaluator,
) -> LoopControl {
    if state.terminated {
        return LoopControl::Stop;
    }
    let Some(native) = state.native.clone() else {
        return LoopControl::Stop;
    };
    match run_iteration(state, &native, emitter, evaluator) {
        Ok(control) => control,
        Err(e) if e.is_disconnect() => {
            error!(error = %e, "runtime connection lost");
            emitter.error_output(format!("Exception in debugger: {e}\n"));
            state.terminated = true;
            emitter.terminated();
            LoopControl::Stop
        }
        Err(e) => {
            warn!(error = %e, "event loop iteration failed");
            emitter.error_output(format!("Exception in debugger: {e}\n"));
            LoopControl::Continue
        }
    }
}

fn run_iteration(
    state: &mut SessionState,
    native: &Arc<dyn NativeSession>,
    emitter: &EventEmitter,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<LoopControl, NativeError> {
    for context in state.contexts.iter_mut() {
        context.resume_on_breakpoint = false;
    }

    while native.event_count()? > 0 {
        let Some(event) = native.next_event()? else {
            break;
        };
        if handle_event(state, native, emitter, evaluator, event)? == LoopControl::Stop {
            return Ok(LoopControl::Stop);
        }
    }

    handle_suspension(state, native.as_ref(), emitter, MAIN_CONTEXT)?;
    for worker in state.contexts.worker_ids() {
        handle_suspension(state, native.as_ref(), emitter, worker)?;
    }
    Ok(LoopControl::Continue)
}

fn handle_event(
    state: &mut SessionState,
    native: &Arc<dyn NativeSession>,
    emitter: &EventEmitter,
    evaluator: &dyn ExpressionEvaluator,
    event: NativeEvent,
) -> Result<LoopControl, NativeError> {
    match event {
        NativeEvent::Trace { text } => {
            emitter.output(trace_text(text));
        }
        NativeEvent::Fault { context_id, fault } => {
            let at = top_location(state, native.as_ref(), context_id)?;
            emitter.output_at(Some("stderr"), fault_text(&fault), at);
            if let Some(context) = state.contexts.get_mut(context_id) {
                context.last_fault = Some(fault);
            }
        }
        NativeEvent::Break {
            context_id,
            file_id,
            line,
        } => {
            handle_break(state, native, emitter, evaluator, context_id, file_id, line)?;
        }
        NativeEvent::ContextCreated { context_id } => {
            if state.contexts.add_worker(context_id) {
                info!(context = context_id, "worker started");
                emitter.thread("started", context_id);
                state.refresh_pending(emitter);
            }
        }
        NativeEvent::ContextExited { context_id } => {
            if state.contexts.remove_worker(context_id) {
                info!(context = context_id, "worker exited");
                emitter.thread("exited", context_id);
            }
        }
        NativeEvent::ScriptLoaded { path, index } => {
            debug!(%path, index, "script loaded");
            if state.main_module.is_none() {
                state.main_module = Some((path, index));
            }
            state.refresh_pending(emitter);
        }
        NativeEvent::ScriptUnloaded { path, index } => {
            let is_main = match &state.main_module {
                Some((main_path, main_index)) => *main_path == path && *main_index == index,
                None => true,
            };
            if is_main {
                info!(%path, "main module unloaded, ending session");
                state.terminated = true;
                emitter.terminated();
                return Ok(LoopControl::Stop);
            }
        }
    }
    Ok(LoopControl::Continue)
}

fn trace_text(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn fault_text(fault: &FaultInfo) -> String {
    let mut text = format!("{}\n", fault.message);
    if !fault.stack_trace.is_empty() {
        text.push_str(&fault.stack_trace);
        if !text.ends_with('\n') {
            text.push('\n');
        }
    }
    text
}

/// Source position of the innermost frame. Frames are unavailable while
/// the context runs; that is not an error.
fn top_location(
    state: &SessionState,
    native: &dyn NativeSession,
    context: ContextId,
) -> Result<Option<(Source, u32)>, NativeError> {
    let frames = match native.frames(context) {
        Ok(frames) => frames,
        Err(e) if e.is_disconnect() => return Err(e),
        Err(_) => return Ok(None),
    };
    Ok(frames.into_iter().next().and_then(|frame| {
        let location = frame.location?;
        let file = location.file?;
        Some((state.sources.to_source(&file), location.line))
    }))
}

fn handle_break(
    state: &mut SessionState,
    native: &Arc<dyn NativeSession>,
    emitter: &EventEmitter,
    evaluator: &dyn ExpressionEvaluator,
    context_id: ContextId,
    file_id: FileId,
    line: u32,
) -> Result<(), NativeError> {
    let Some(extras) = state.breakpoints.find_extras(context_id, file_id, line).cloned() else {
        return Ok(());
    };
    let scope = NativeExpressionContext::for_frame(native.clone(), context_id, 0);

    if let Some(condition) = &extras.condition {
        let holds = evaluator
            .evaluate(condition, &scope)
            .map(|result| to_boolean(result.value()))
            .unwrap_or(false);
        if !holds {
            debug!(context = context_id, line, %condition, "condition false, resuming");
            if let Some(context) = state.contexts.get_mut(context_id) {
                context.resume_on_breakpoint = true;
            }
            return Ok(());
        }
    }

    if let Some(message) = &extras.log_message {
        let mut text = interpolate_log_message(message, |expr| {
            evaluator
                .evaluate(expr, &scope)
                .ok()
                .map(|result| display_text(result.value()))
        });
        text.push('\n');
        let at = top_location(state, native.as_ref(), context_id)?;
        emitter.output_at(None, text, at);
        if let Some(context) = state.contexts.get_mut(context_id) {
            context.resume_on_breakpoint = true;
        }
    }
    Ok(())
}

fn handle_suspension(
    state: &mut SessionState,
    native: &dyn NativeSession,
    emitter: &EventEmitter,
    context_id: ContextId,
) -> Result<(), NativeError> {
    let Some(context) = state.contexts.get_mut(context_id) else {
        return Ok(());
    };
    if context.waiting_for_resume {
        return Ok(());
    }
    if !native.is_suspended(context_id)? {
        context.suspended = false;
        return Ok(());
    }
    context.suspended = true;
    let resume_on_breakpoint = context.resume_on_breakpoint;

    let reason = native.suspend_reason(context_id)?;
    debug!(context = context_id, reason = reason.as_str(), "context suspended");
    match reason {
        SuspendReason::ScriptLoaded if context_id == MAIN_CONTEXT => {
            if !state.initialized {
                state.initialized = true;
                emitter.initialized();
            }
            if state.configuration_done {
                state.refresh_pending(emitter);
                resume(state, native, context_id)?;
            } else if let Some(context) = state.contexts.get_mut(context_id) {
                context.waiting_for_resume = true;
            }
        }
        SuspendReason::ScriptLoaded => resume(state, native, context_id)?,
        SuspendReason::Breakpoint if resume_on_breakpoint => resume(state, native, context_id)?,
        SuspendReason::Breakpoint => report(state, emitter, context_id, StopReason::Breakpoint, None, None),
        SuspendReason::Step => report(state, emitter, context_id, StopReason::Step, None, None),
        SuspendReason::StopRequest => report(state, emitter, context_id, StopReason::Pause, None, None),
        SuspendReason::Fault => {
            let text = state
                .contexts
                .get(context_id)
                .and_then(|c| c.last_fault.as_ref())
                .map(|f| f.message.clone());
            report(
                state,
                emitter,
                context_id,
                StopReason::Exception,
                Some("Paused on exception".to_string()),
                text,
            );
        }
        SuspendReason::Unknown => report(state, emitter, context_id, StopReason::Unknown, None, None),
        other => {
            report(state, emitter, context_id, StopReason::Unknown, None, None);
            let suffix = if context_id == MAIN_CONTEXT {
                String::new()
            } else {
                format!(" for context with ID: {context_id}")
            };
            emitter.output(format!("Unknown suspend reason: {}{suffix}\n", other.as_str()));
        }
    }
    Ok(())
}

fn resume(state: &mut SessionState, native: &dyn NativeSession, context_id: ContextId) -> Result<(), NativeError> {
    native.resume(context_id)?;
    if let Some(context) = state.contexts.get_mut(context_id) {
        context.mark_running();
    }
    Ok(())
}

fn report(
    state: &mut SessionState,
    emitter: &EventEmitter,
    context_id: ContextId,
    reason: StopReason,
    description: Option<String>,
    text: Option<String>,
) {
    if let Some(context) = state.contexts.get_mut(context_id) {
        context.waiting_for_resume = true;
    }
    emitter.stopped(context_id, reason, description, text);
}

/// Handle of a background loop task.
pub struct EventLoopHandle {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl EventLoopHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the task and waits up to `wait` for it to finish.
    pub async fn shutdown(self, wait: Duration) {
        self.cancel();
        match tokio::time::timeout(wait, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "event loop task failed"),
            Err(_) => warn!("event loop did not stop in time"),
        }
    }
}

/// Starts the event loop on its own task.
pub fn spawn_event_loop(
    state: Arc<Mutex<SessionState>>,
    emitter: EventEmitter,
    evaluator: Arc<dyn ExpressionEvaluator>,
    interval: Duration,
) -> EventLoopHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancelled = cancel.clone();
    let task = tokio::spawn(async move {
        info!("event loop started");
        loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            let guard = state.clone().lock_owned().await;
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            let emitter = emitter.clone();
            let evaluator = evaluator.clone();
            // Native calls block, so the iteration runs off the async workers.
            let iteration = tokio::task::spawn_blocking(move || {
                let mut guard = guard;
                poll_once(&mut guard, &emitter, evaluator.as_ref())
            })
            .await;
            match iteration {
                Ok(LoopControl::Continue) => {}
                Ok(LoopControl::Stop) => break,
                Err(e) => {
                    error!(error = %e, "event loop iteration panicked");
                    break;
                }
            }
            tokio::time::sleep(interval).await;
        }
        info!("event loop stopped");
    });
    EventLoopHandle { cancel, task }
}

/// Watches a runtime started without debugging and ends the session when
/// it exits.
pub fn spawn_run_watcher(
    state: Arc<Mutex<SessionState>>,
    emitter: EventEmitter,
    interval: Duration,
) -> EventLoopHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancelled = cancel.clone();
    let task = tokio::spawn(async move {
        loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            {
                let mut guard = state.lock().await;
                let Some(process) = guard.process.as_mut() else {
                    break;
                };
                match process.try_exit_code() {
                    Ok(None) => {}
                    Ok(Some(code)) => {
                        info!(exit_code = code, "runtime exited");
                        guard.process = None;
                        guard.terminated = true;
                        emitter.exited(code);
                        emitter.terminated();
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to poll runtime process");
                        guard.process = None;
                        guard.terminated = true;
                        emitter.terminated();
                        break;
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
    });
    EventLoopHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swfdap_core::sim::{SimFile, SimFrame, SimulatedSession};
    use swfdap_core::{Location, Value, Variable};
    use swfdap_protocol::{Event, SourceBreakpoint};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::expression::BasicEvaluator;

    fn setup() -> (Arc<SimulatedSession>, SessionState, EventEmitter, UnboundedReceiver<Event>) {
        let session = Arc::new(SimulatedSession::new());
        let mut state = SessionState::default();
        state.native = Some(session.clone());
        let (emitter, rx) = EventEmitter::channel();
        (session, state, emitter, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event.as_str()).collect()
    }

    fn poll(state: &mut SessionState, emitter: &EventEmitter) -> LoopControl {
        poll_once(state, emitter, &BasicEvaluator)
    }

    #[test]
    fn first_script_load_sends_initialized_and_holds() {
        let (session, mut state, emitter, mut rx) = setup();
        session.halt(MAIN_CONTEXT, SuspendReason::ScriptLoaded);
        assert_eq!(poll(&mut state, &emitter), LoopControl::Continue);
        assert_eq!(names(&drain(&mut rx)), vec!["initialized"]);
        assert!(state.contexts.main().waiting_for_resume);
        assert!(session.calls().is_empty());

        // Held contexts are not reported again.
        poll(&mut state, &emitter);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn later_script_load_resumes_after_configuration_done() {
        let (session, mut state, emitter, mut rx) = setup();
        state.initialized = true;
        state.configuration_done = true;
        session.halt(MAIN_CONTEXT, SuspendReason::ScriptLoaded);
        poll(&mut state, &emitter);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.calls(), vec!["resume 0".to_string()]);
        assert!(!state.contexts.main().suspended);
    }

    #[test]
    fn stop_reasons_map_to_protocol_reasons() {
        for (reason, expected) in [
            (SuspendReason::Breakpoint, "breakpoint"),
            (SuspendReason::Step, "step"),
            (SuspendReason::StopRequest, "pause"),
            (SuspendReason::Unknown, "unknown"),
        ] {
            let (session, mut state, emitter, mut rx) = setup();
            session.halt(MAIN_CONTEXT, reason);
            poll(&mut state, &emitter);
            let events = drain(&mut rx);
            assert_eq!(names(&events), vec!["stopped"]);
            assert_eq!(events[0].body.as_ref().unwrap()["reason"], expected);
            assert!(state.contexts.main().waiting_for_resume);
        }
    }

    #[test]
    fn unusual_reason_reports_unknown_with_diagnostic() {
        let (session, mut state, emitter, mut rx) = setup();
        state.contexts.add_worker(3);
        session.halt(3, SuspendReason::HaltOpcode);
        poll(&mut state, &emitter);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["stopped", "output"]);
        assert_eq!(
            events[1].body.as_ref().unwrap()["output"],
            "Unknown suspend reason: HaltOpcode for context with ID: 3\n"
        );
    }

    #[test]
    fn fault_is_reported_as_exception() {
        let (session, mut state, emitter, mut rx) = setup();
        session.push_event(NativeEvent::Fault {
            context_id: MAIN_CONTEXT,
            fault: FaultInfo {
                message: "TypeError: Error #1009".into(),
                stack_trace: "at Main/run()".into(),
                thrown: None,
            },
        });
        session.halt(MAIN_CONTEXT, SuspendReason::Fault);
        poll(&mut state, &emitter);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["output", "stopped"]);
        let output = events[0].body.as_ref().unwrap();
        assert_eq!(output["category"], "stderr");
        assert_eq!(output["output"], "TypeError: Error #1009\nat Main/run()\n");
        let stopped = events[1].body.as_ref().unwrap();
        assert_eq!(stopped["reason"], "exception");
        assert_eq!(stopped["description"], "Paused on exception");
        assert_eq!(stopped["text"], "TypeError: Error #1009");
    }

    #[test]
    fn trace_output_gets_trailing_newline() {
        let (session, mut state, emitter, mut rx) = setup();
        session.push_event(NativeEvent::Trace { text: "hello".into() });
        session.push_event(NativeEvent::Trace { text: String::new() });
        poll(&mut state, &emitter);
        let events = drain(&mut rx);
        assert_eq!(events[0].body.as_ref().unwrap()["output"], "hello\n");
        assert_eq!(events[1].body.as_ref().unwrap()["output"], "\n");
    }

    #[test]
    fn workers_come_and_go() {
        let (session, mut state, emitter, mut rx) = setup();
        session.add_context(2);
        session.push_event(NativeEvent::ContextCreated { context_id: 2 });
        poll(&mut state, &emitter);
        assert_eq!(state.contexts.worker_ids(), vec![2]);
        session.push_event(NativeEvent::ContextExited { context_id: 2 });
        poll(&mut state, &emitter);
        assert!(state.contexts.worker_ids().is_empty());
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["thread", "thread"]);
        assert_eq!(events[0].body.as_ref().unwrap()["reason"], "started");
        assert_eq!(events[1].body.as_ref().unwrap()["reason"], "exited");
    }

    #[test]
    fn worker_script_load_resumes_immediately() {
        let (session, mut state, emitter, mut rx) = setup();
        state.contexts.add_worker(4);
        session.halt(4, SuspendReason::ScriptLoaded);
        poll(&mut state, &emitter);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.calls(), vec!["resume 4".to_string()]);
    }

    #[test]
    fn main_module_unload_terminates() {
        let (session, mut state, emitter, mut rx) = setup();
        session.push_event(NativeEvent::ScriptLoaded {
            path: "/bin/Main.swf".into(),
            index: 0,
        });
        session.push_event(NativeEvent::ScriptUnloaded {
            path: "/bin/Other.swf".into(),
            index: 1,
        });
        assert_eq!(poll(&mut state, &emitter), LoopControl::Continue);
        assert_eq!(state.main_module, Some(("/bin/Main.swf".into(), 0)));

        session.push_event(NativeEvent::ScriptUnloaded {
            path: "/bin/Main.swf".into(),
            index: 0,
        });
        assert_eq!(poll(&mut state, &emitter), LoopControl::Stop);
        assert_eq!(names(&drain(&mut rx)), vec!["terminated"]);
        assert!(state.terminated);
    }

    #[test]
    fn disconnect_ends_loop_with_error_output() {
        let (session, mut state, emitter, mut rx) = setup();
        session.disconnect();
        assert_eq!(poll(&mut state, &emitter), LoopControl::Stop);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["output", "terminated"]);
        assert_eq!(
            events[0].body.as_ref().unwrap()["output"],
            "Exception in debugger: not connected to the runtime\n"
        );
    }

    fn logpoint_setup(
        request: SourceBreakpoint,
    ) -> (Arc<SimulatedSession>, SessionState, EventEmitter, UnboundedReceiver<Event>) {
        let (session, mut state, emitter, rx) = setup();
        session.add_file(MAIN_CONTEXT, SimFile::new(1, "/src/a.as"));
        let location = Location {
            context_id: MAIN_CONTEXT,
            file_id: 1,
            line: request.line as u32,
            file: session.source_files(MAIN_CONTEXT).unwrap().into_iter().next(),
        };
        let mut frame = SimFrame::new("Main/run()", Some(location));
        frame.locals.push(Variable::new("x", Value::number(3.0)));
        session.set_frames(MAIN_CONTEXT, vec![frame]);
        state.set_breakpoints("/src/a.as", &[request], &emitter);
        (session, state, emitter, rx)
    }

    fn hit(session: &SimulatedSession, line: u32) {
        session.push_event(NativeEvent::Break {
            context_id: MAIN_CONTEXT,
            file_id: 1,
            line,
        });
        session.halt(MAIN_CONTEXT, SuspendReason::Breakpoint);
    }

    #[test]
    fn logpoint_prints_and_resumes() {
        let (session, mut state, emitter, mut rx) = logpoint_setup(SourceBreakpoint {
            line: 10,
            log_message: Some("x is {x}".into()),
            ..SourceBreakpoint::default()
        });
        hit(&session, 10);
        poll(&mut state, &emitter);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["output"]);
        let body = events[0].body.as_ref().unwrap();
        assert_eq!(body["output"], "x is 3\n");
        assert_eq!(body["line"], 10);
        assert_eq!(session.calls(), vec!["resume 0".to_string()]);
    }

    #[test]
    fn false_condition_resumes_silently() {
        let (session, mut state, emitter, mut rx) = logpoint_setup(SourceBreakpoint {
            line: 10,
            condition: Some("x > 5".into()),
            ..SourceBreakpoint::default()
        });
        hit(&session, 10);
        poll(&mut state, &emitter);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.calls(), vec!["resume 0".to_string()]);
    }

    #[test]
    fn true_condition_stops_once() {
        let (session, mut state, emitter, mut rx) = logpoint_setup(SourceBreakpoint {
            line: 10,
            condition: Some("x == 3".into()),
            ..SourceBreakpoint::default()
        });
        hit(&session, 10);
        poll(&mut state, &emitter);
        poll(&mut state, &emitter);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["stopped"]);
        assert_eq!(events[0].body.as_ref().unwrap()["reason"], "breakpoint");
        assert!(session.calls().is_empty());
    }

    #[test]
    fn broken_condition_counts_as_false() {
        let (session, mut state, emitter, mut rx) = logpoint_setup(SourceBreakpoint {
            line: 10,
            condition: Some("nope.missing >".into()),
            ..SourceBreakpoint::default()
        });
        hit(&session, 10);
        poll(&mut state, &emitter);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.calls(), vec!["resume 0".to_string()]);
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_cancel() {
        let (session, state, emitter, mut rx) = setup();
        session.halt(MAIN_CONTEXT, SuspendReason::StopRequest);
        let state = Arc::new(Mutex::new(state));
        let handle = spawn_event_loop(
            state.clone(),
            emitter,
            Arc::new(BasicEvaluator),
            Duration::from_millis(5),
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "stopped");
        handle.shutdown(Duration::from_secs(5)).await;
        assert!(state.lock().await.contexts.main().waiting_for_resume);
    }

    #[tokio::test]
    async fn run_watcher_reports_exit() {
        let state = Arc::new(Mutex::new(SessionState::default()));
        state.lock().await.process = Some(Box::new(swfdap_core::sim::SimulatedProcess::new(3, 1)));
        let (emitter, mut rx) = EventEmitter::channel();
        let handle = spawn_run_watcher(state.clone(), emitter, Duration::from_millis(5));
        let exited = rx.recv().await.unwrap();
        assert_eq!(exited.event, "exited");
        assert_eq!(exited.body.unwrap()["exitCode"], 3);
        assert_eq!(rx.recv().await.unwrap().event, "terminated");
        handle.shutdown(Duration::from_secs(5)).await;
        assert!(state.lock().await.terminated);
    }
}
