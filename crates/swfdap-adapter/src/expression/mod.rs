//! Expression evaluation against a suspended runtime.
//!
//! An [`ExpressionEvaluator`] parses and evaluates source text; it reaches
//! the runtime only through an [`ExpressionContext`], which resolves names
//! inside one frame (or inside one object) and writes assignments back.
//! Breakpoint conditions, logpoint messages and the `evaluate` request all
//! go through this boundary.

pub mod context;
pub mod evaluator;
mod lexer;
mod parser;

use thiserror::Error;

use swfdap_core::{Value, ValueKind, Variable};

pub use context::{ExpressionContext, NativeExpressionContext};
pub use evaluator::{BasicEvaluator, ExpressionEvaluator};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("syntax error: {0}")]
    Parse(String),

    #[error("no such variable: {0}")]
    NoSuchVariable(String),

    #[error("type error: {0}")]
    Type(String),
}

/// Result of evaluating an expression: a named slot when the expression
/// designates one, otherwise a computed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Variable(Variable),
    Value(Value),
}

impl Evaluated {
    pub fn value(&self) -> &Value {
        match self {
            Evaluated::Variable(v) => &v.value,
            Evaluated::Value(v) => v,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Evaluated::Variable(v) => v.value,
            Evaluated::Value(v) => v,
        }
    }
}

/// ECMAScript `ToBoolean`.
pub fn to_boolean(value: &Value) -> bool {
    match value.kind {
        ValueKind::Undefined | ValueKind::Null => false,
        ValueKind::Boolean => value.text == "true",
        ValueKind::Number => {
            let n = to_number(value);
            !(n.is_nan() || n == 0.0)
        }
        ValueKind::String => !value.text.is_empty(),
        _ => true,
    }
}

/// ECMAScript `ToNumber` for the primitive kinds; objects are `NaN`.
pub fn to_number(value: &Value) -> f64 {
    match value.kind {
        ValueKind::Null => 0.0,
        ValueKind::Boolean => {
            if value.text == "true" {
                1.0
            } else {
                0.0
            }
        }
        ValueKind::Number | ValueKind::String => parse_number_text(&value.text),
        _ => f64::NAN,
    }
}

fn parse_number_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "NaN" => return f64::NAN,
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Text of a value as printed in logpoint output.
pub fn display_text(value: &Value) -> String {
    if value.is_reference() {
        value.type_name.clone()
    } else {
        value.text.clone()
    }
}

/// Replaces every `{expr}` in `message` with the text `eval` returns for
/// it. Placeholders that fail to evaluate, and an unclosed `{`, are kept
/// literally.
pub fn interpolate_log_message<F>(message: &str, mut eval: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let expr = &after[..close];
        match eval(expr.trim()) {
            Some(text) => out.push_str(&text),
            None => {
                out.push('{');
                out.push_str(expr);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
