//! swfdap-core — the native SWF debugger as seen by the adapter.
//!
//! Defines the session-oriented debugger interface ([`NativeSession`],
//! [`SessionManager`]), its data model and closed event set, plus an
//! in-memory implementation used for tests and scripted replays.

pub mod error;
pub mod event;
pub mod logging;
pub mod native;
pub mod sim;
pub mod types;

pub use error::NativeError;
pub use event::NativeEvent;
pub use native::{AirLaunchInfo, LaunchTarget, NativeSession, RuntimeInfo, SessionManager};
pub use sim::{Scenario, SimulatedManager, SimulatedSession};
pub use types::*;
