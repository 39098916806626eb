//! Request-level lifecycle of a debug session.

use crate::error::AdapterError;

/// Where the session is in the initialize / launch / disconnect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, `initialize` not received yet.
    Uninitialized,
    /// The `initialize` handshake has completed.
    Initialized,
    /// A launch or attach succeeded.
    Debugging,
    /// Disconnected, or the debuggee went away.
    Terminated,
}

/// Guards which requests are acceptable in the current lifecycle state.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: Lifecycle,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            state: Lifecycle::Uninitialized,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    fn require_not_terminated(&self) -> Result<(), AdapterError> {
        if self.state == Lifecycle::Terminated {
            return Err(AdapterError::Terminated);
        }
        Ok(())
    }

    /// Transition: Uninitialized → Initialized.
    pub fn initialize(&mut self) -> Result<(), AdapterError> {
        self.require_not_terminated()?;
        if self.state != Lifecycle::Uninitialized {
            return Err(AdapterError::Rejected {
                message: format!("cannot initialize: session is in {:?} state", self.state),
            });
        }
        self.state = Lifecycle::Initialized;
        Ok(())
    }

    /// Checks that a launch or attach may start now.
    pub fn require_startable(&self, op: &str) -> Result<(), AdapterError> {
        match self.state {
            Lifecycle::Uninitialized => Err(AdapterError::NotInitialized),
            Lifecycle::Terminated => Err(AdapterError::Terminated),
            Lifecycle::Debugging => Err(AdapterError::Rejected {
                message: format!("cannot {op}: a debug session is already running"),
            }),
            Lifecycle::Initialized => Ok(()),
        }
    }

    /// Transition: Initialized → Debugging.
    pub fn start(&mut self, op: &str) -> Result<(), AdapterError> {
        self.require_startable(op)?;
        self.state = Lifecycle::Debugging;
        Ok(())
    }

    /// Transition: any → Terminated. Repeated calls are no-ops.
    pub fn terminate(&mut self) {
        self.state = Lifecycle::Terminated;
    }

    pub fn is_terminated(&self) -> bool {
        self.state == Lifecycle::Terminated
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
