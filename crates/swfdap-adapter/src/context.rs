//! Adapter-side bookkeeping for execution contexts.

use swfdap_core::{ContextId, FaultInfo, MAIN_CONTEXT};

/// Suspension state of a context as the adapter sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Halted by the runtime, but not yet classified by the event loop.
    SuspendedAwaitingPolicy,
    /// A `stopped` event was sent, or the loop is holding the context.
    SuspendedReportedToClient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    pub id: ContextId,
    pub suspended: bool,
    pub waiting_for_resume: bool,
    pub last_fault: Option<FaultInfo>,
    /// Set by a logpoint hit or a false condition; cleared each loop
    /// iteration.
    pub resume_on_breakpoint: bool,
}

impl ExecutionContext {
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            suspended: false,
            waiting_for_resume: false,
            last_fault: None,
            resume_on_breakpoint: false,
        }
    }

    pub fn state(&self) -> ContextState {
        match (self.suspended, self.waiting_for_resume) {
            (false, _) => ContextState::Running,
            (true, false) => ContextState::SuspendedAwaitingPolicy,
            (true, true) => ContextState::SuspendedReportedToClient,
        }
    }

    /// Forget everything tied to the last suspension.
    pub fn mark_running(&mut self) {
        self.suspended = false;
        self.waiting_for_resume = false;
        self.last_fault = None;
    }
}

/// The main context plus live workers, in registration order.
#[derive(Debug, Clone)]
pub struct ContextTable {
    main: ExecutionContext,
    workers: Vec<ExecutionContext>,
}

impl Default for ContextTable {
    fn default() -> Self {
        Self {
            main: ExecutionContext::new(MAIN_CONTEXT),
            workers: Vec::new(),
        }
    }
}

impl ContextTable {
    pub fn main(&self) -> &ExecutionContext {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut ExecutionContext {
        &mut self.main
    }

    pub fn get(&self, id: ContextId) -> Option<&ExecutionContext> {
        if id == MAIN_CONTEXT {
            return Some(&self.main);
        }
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut ExecutionContext> {
        if id == MAIN_CONTEXT {
            return Some(&mut self.main);
        }
        self.workers.iter_mut().find(|w| w.id == id)
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.get(id).is_some()
    }

    /// Registers a worker. Returns `false` if the id is already known.
    pub fn add_worker(&mut self, id: ContextId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.workers.push(ExecutionContext::new(id));
        true
    }

    /// Removes a worker. The main context is never removed.
    pub fn remove_worker(&mut self, id: ContextId) -> bool {
        let before = self.workers.len();
        self.workers.retain(|w| w.id != id);
        before != self.workers.len()
    }

    pub fn worker_ids(&self) -> Vec<ContextId> {
        self.workers.iter().map(|w| w.id).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExecutionContext> {
        std::iter::once(&mut self.main).chain(self.workers.iter_mut())
    }
}
