//! swfdap-adapter — the debug session behind the DAP server.
//!
//! Translates client requests into native debugger calls, polls the
//! runtime for events, and keeps the client's view of threads, frames,
//! variables and breakpoints consistent with what the runtime reports.

pub mod breakpoint;
pub mod capabilities;
pub mod context;
pub mod emitter;
pub mod error;
pub mod event_loop;
pub mod expression;
pub mod lifecycle;
pub mod literal;
pub mod reference;
pub mod session;
pub mod source;
pub mod state;

// Re-export key types for convenience.
pub use breakpoint::BreakpointReconciler;
pub use emitter::EventEmitter;
pub use error::AdapterError;
pub use expression::{BasicEvaluator, ExpressionEvaluator};
pub use lifecycle::Lifecycle;
pub use session::DebugSession;
