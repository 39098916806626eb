//! Asynchronous notifications queued by the native debugger.

use serde::{Deserialize, Serialize};

use crate::types::{ContextId, FaultInfo, FileId};

/// Everything the runtime can report between polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeEvent {
    /// Text printed by the debuggee.
    Trace { text: String },
    /// A runtime error was raised in a context.
    Fault {
        context_id: ContextId,
        fault: FaultInfo,
    },
    /// A context reached a breakpoint location.
    Break {
        context_id: ContextId,
        file_id: FileId,
        line: u32,
    },
    ContextCreated { context_id: ContextId },
    ContextExited { context_id: ContextId },
    /// A script module (SWF) was loaded. `index` distinguishes repeated
    /// loads of the same path.
    ScriptLoaded { path: String, index: u32 },
    ScriptUnloaded { path: String, index: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_event_from_json() {
        let json = r#"{"type":"break","context_id":0,"file_id":4,"line":10}"#;
        let event: NativeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            NativeEvent::Break {
                context_id: 0,
                file_id: 4,
                line: 10
            }
        );
    }

    #[test]
    fn fault_event_defaults_optional_fields() {
        let json = r#"{"type":"fault","context_id":2,"fault":{"message":"TypeError"}}"#;
        let event: NativeEvent = serde_json::from_str(json).unwrap();
        match event {
            NativeEvent::Fault { context_id, fault } => {
                assert_eq!(context_id, 2);
                assert_eq!(fault.message, "TypeError");
                assert!(fault.stack_trace.is_empty());
                assert!(fault.thrown.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
