//! Data model shared by the native debugger interface and the adapter.

use serde::{Deserialize, Serialize};

/// Identifier of an execution context (isolate). `0` is the main context.
pub type ContextId = u32;

/// The main execution context.
pub const MAIN_CONTEXT: ContextId = 0;

/// Identifier of a script file, unique within the session.
pub type FileId = u32;

/// Identifier of an object-like runtime value.
pub type ValueId = u64;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Runtime classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Function,
    MovieClip,
    Xml,
    Namespace,
    Unknown,
}

/// A runtime value as reported by the native debugger.
///
/// Object-like values carry an `id` that can be used to fetch members.
/// Primitive values carry their rendering in `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    #[serde(default)]
    pub id: Option<ValueId>,
    pub kind: ValueKind,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub text: String,
}

impl Value {
    pub fn undefined() -> Self {
        Self::primitive(ValueKind::Undefined, "void", "undefined")
    }

    pub fn null() -> Self {
        Self::primitive(ValueKind::Null, "null", "null")
    }

    pub fn boolean(value: bool) -> Self {
        Self::primitive(ValueKind::Boolean, "Boolean", if value { "true" } else { "false" })
    }

    pub fn number(value: f64) -> Self {
        Self::primitive(ValueKind::Number, "Number", &format_number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: ValueKind::String,
            type_name: "String".into(),
            text: value.into(),
        }
    }

    pub fn object(id: ValueId, type_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            kind: ValueKind::Object,
            type_name: type_name.into(),
            text: String::new(),
        }
    }

    fn primitive(kind: ValueKind, type_name: &str, text: &str) -> Self {
        Self {
            id: None,
            kind,
            type_name: type_name.into(),
            text: text.into(),
        }
    }

    /// Whether the value has members that can be listed.
    pub fn is_reference(&self) -> bool {
        self.id.is_some()
    }
}

/// Formats a number the way the runtime prints it: integral values
/// without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Unspecified,
    Public,
    Private,
    Protected,
    Internal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttributes {
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub read_only: bool,
}

/// Where a variable lives, used when writing it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableOwner {
    /// An argument or local of the given frame.
    Frame(usize),
    /// A member of an object.
    Object(ValueId),
    #[default]
    Global,
}

/// A named slot holding a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub attributes: VariableAttributes,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub owner: VariableOwner,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            attributes: VariableAttributes::default(),
            visibility: Visibility::default(),
            owner: VariableOwner::default(),
        }
    }

    pub fn owned_by(mut self, owner: VariableOwner) -> Self {
        self.owner = owner;
        self
    }
}

// ---------------------------------------------------------------------------
// Source and frames
// ---------------------------------------------------------------------------

/// A script file known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: FileId,
    /// Short name, usually the file name.
    pub name: String,
    pub full_path: String,
}

/// A resolved code location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub context_id: ContextId,
    pub file_id: FileId,
    pub line: u32,
    #[serde(default)]
    pub file: Option<SourceFile>,
}

/// One activation record on a context's call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub call_signature: String,
    #[serde(default)]
    pub location: Option<Location>,
}

// ---------------------------------------------------------------------------
// Suspension and faults
// ---------------------------------------------------------------------------

/// Why the runtime halted a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    Unknown,
    Breakpoint,
    Watch,
    Fault,
    StopRequest,
    Step,
    HaltOpcode,
    ScriptLoaded,
}

impl SuspendReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuspendReason::Unknown => "Unknown",
            SuspendReason::Breakpoint => "Breakpoint",
            SuspendReason::Watch => "Watch",
            SuspendReason::Fault => "Fault",
            SuspendReason::StopRequest => "StopRequest",
            SuspendReason::Step => "Step",
            SuspendReason::HaltOpcode => "HaltOpcode",
            SuspendReason::ScriptLoaded => "ScriptLoaded",
        }
    }
}

/// The last runtime error raised in a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultInfo {
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
    /// The thrown object, when the runtime exposes it.
    #[serde(default)]
    pub thrown: Option<Value>,
}
