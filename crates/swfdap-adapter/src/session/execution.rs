//! `continue`, the step commands and `pause`.

use tracing::debug;

use swfdap_core::ContextId;
use swfdap_protocol::{ContinueResponseBody, Request, Response, ThreadArguments};

use super::{context_id, DebugSession};
use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeAction {
    Continue,
    StepOver,
    StepInto,
    StepOut,
}

impl ResumeAction {
    fn from_command(command: &str) -> Option<Self> {
        match command {
            "continue" => Some(Self::Continue),
            "next" => Some(Self::StepOver),
            "stepIn" => Some(Self::StepInto),
            "stepOut" => Some(Self::StepOut),
            _ => None,
        }
    }
}

impl DebugSession {
    pub(super) async fn resume(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let Some(action) = ResumeAction::from_command(&request.command) else {
            return Err(AdapterError::Rejected {
                message: format!("'{}' does not resume execution", request.command),
            });
        };
        let args: ThreadArguments = request.parse_arguments()?;
        let native = self.native().await?;
        let context = match self.addressed_context(args.thread_id, true).await {
            Ok(context) => context,
            Err(text) => return Ok(Response::failure(request, text)),
        };

        self.run_native(&request.command, move || match action {
            ResumeAction::Continue => native.resume(context),
            ResumeAction::StepOver => native.step_over(context),
            ResumeAction::StepInto => native.step_into(context),
            ResumeAction::StepOut => native.step_out(context),
        })
        .await?;

        if let Some(state) = self.state.lock().await.contexts.get_mut(context) {
            state.mark_running();
        }
        debug!(context, ?action, "resumed");

        Ok(match action {
            ResumeAction::Continue => Response::success(
                request,
                Some(ContinueResponseBody {
                    all_threads_continued: false,
                }),
            ),
            _ => Response::success::<()>(request, None),
        })
    }

    pub(super) async fn pause(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: ThreadArguments = request.parse_arguments()?;
        let native = self.native().await?;
        let context = match self.addressed_context(args.thread_id, false).await {
            Ok(context) => context,
            Err(text) => return Ok(Response::failure(request, text)),
        };

        self.run_native("pause", move || native.suspend(context))
            .await?;

        if let Some(state) = self.state.lock().await.contexts.get_mut(context) {
            state.waiting_for_resume = false;
        }
        Ok(Response::success::<()>(request, None))
    }

    /// Resolves a thread id to a live context whose suspension matches
    /// `suspended`. The error is the text of the failed response.
    pub(super) async fn addressed_context(
        &self,
        thread_id: i64,
        suspended: bool,
    ) -> Result<ContextId, String> {
        let state = self.state.lock().await;
        let Some(context) = context_id(thread_id).and_then(|id| state.contexts.get(id)) else {
            return Err(format!("Unknown thread id: {thread_id}"));
        };
        match (suspended, context.suspended) {
            (true, false) => Err(format!("Thread {thread_id} is not suspended")),
            (false, true) => Err(format!("Thread {thread_id} is already suspended")),
            _ => Ok(context.id),
        }
    }
}
