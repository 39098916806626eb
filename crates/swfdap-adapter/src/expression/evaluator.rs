//! Evaluation of parsed expressions.

use swfdap_core::{format_number, Value, ValueKind, Variable};

use super::context::ExpressionContext;
use super::parser::{parse, BinaryOp, Expr, LogicalOp, UnaryOp};
use super::{display_text, to_boolean, to_number, Evaluated, ExpressionError};

/// Evaluates expression text against a context.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        context: &dyn ExpressionContext,
    ) -> Result<Evaluated, ExpressionError>;
}

/// ActionScript-flavoured evaluator covering literals, member access,
/// arithmetic, comparisons, logical operators and assignment. Function
/// calls are not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEvaluator;

impl ExpressionEvaluator for BasicEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &dyn ExpressionContext,
    ) -> Result<Evaluated, ExpressionError> {
        let expr = parse(expression)?;
        eval(&expr, context)
    }
}

fn eval(expr: &Expr, ctx: &dyn ExpressionContext) -> Result<Evaluated, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(Evaluated::Value(value.clone())),
        Expr::This => ctx.lookup("this").map(Evaluated::Variable),
        Expr::Ident(name) => ctx.lookup(name).map(Evaluated::Variable),
        Expr::Member(object, name) => {
            let target = into_variable(eval(object, ctx)?);
            member(&target, name, ctx)
        }
        Expr::Index(object, index) => {
            let target = into_variable(eval(object, ctx)?);
            let key = property_key(&eval(index, ctx)?.into_value());
            if !target.value.is_reference() {
                return member(&target, &key, ctx);
            }
            ctx.lookup_members(&target.value)?
                .into_iter()
                .find(|m| m.name == key)
                .map(Evaluated::Variable)
                .ok_or(ExpressionError::NoSuchVariable(key))
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, ctx)?.into_value();
            Ok(Evaluated::Value(match op {
                UnaryOp::Not => Value::boolean(!to_boolean(&value)),
                UnaryOp::Neg => Value::number(-to_number(&value)),
                UnaryOp::Plus => Value::number(to_number(&value)),
            }))
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, ctx)?.into_value();
            let right = eval(right, ctx)?.into_value();
            Ok(Evaluated::Value(binary(*op, &left, &right)))
        }
        Expr::Logical(op, left, right) => {
            let left = eval(left, ctx)?;
            let truthy = to_boolean(left.value());
            match (op, truthy) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => eval(right, ctx),
            }
        }
        Expr::Assign(target, value) => {
            let Evaluated::Variable(slot) = eval(target, ctx)? else {
                return Err(ExpressionError::Type("invalid assignment target".into()));
            };
            let value = eval(value, ctx)?.into_value();
            ctx.assign(&slot, &value);
            Ok(Evaluated::Value(value))
        }
    }
}

fn into_variable(evaluated: Evaluated) -> Variable {
    match evaluated {
        Evaluated::Variable(v) => v,
        Evaluated::Value(v) => Variable::new("", v),
    }
}

fn member(target: &Variable, name: &str, ctx: &dyn ExpressionContext) -> Result<Evaluated, ExpressionError> {
    if target.value.kind == ValueKind::String && name == "length" {
        let length = target.value.text.chars().count();
        return Ok(Evaluated::Value(Value::number(length as f64)));
    }
    let Some(inner) = ctx.create_context(target) else {
        return Err(ExpressionError::Type(format!(
            "cannot read property '{name}' of {}",
            display_text(&target.value)
        )));
    };
    inner.lookup(name).map(Evaluated::Variable)
}

fn property_key(value: &Value) -> String {
    match value.kind {
        ValueKind::Number => format_number(to_number(value)),
        _ => display_text(value),
    }
}

fn to_text(value: &Value) -> String {
    match value.kind {
        ValueKind::Undefined => "undefined".to_string(),
        ValueKind::Null => "null".to_string(),
        _ => display_text(value),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if left.kind == ValueKind::String || right.kind == ValueKind::String {
                Value::string(format!("{}{}", to_text(left), to_text(right)))
            } else {
                Value::number(to_number(left) + to_number(right))
            }
        }
        BinaryOp::Sub => Value::number(to_number(left) - to_number(right)),
        BinaryOp::Mul => Value::number(to_number(left) * to_number(right)),
        BinaryOp::Div => Value::number(to_number(left) / to_number(right)),
        BinaryOp::Rem => Value::number(to_number(left) % to_number(right)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            Value::boolean(compare(op, left, right))
        }
        BinaryOp::Eq => Value::boolean(loose_equals(left, right)),
        BinaryOp::NotEq => Value::boolean(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::boolean(strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::boolean(!strict_equals(left, right)),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if left.kind == ValueKind::String && right.kind == ValueKind::String {
        let (l, r) = (&left.text, &right.text);
        return match op {
            BinaryOp::Less => l < r,
            BinaryOp::LessEq => l <= r,
            BinaryOp::Greater => l > r,
            _ => l >= r,
        };
    }
    let (l, r) = (to_number(left), to_number(right));
    // Any comparison with NaN is false.
    match op {
        BinaryOp::Less => l < r,
        BinaryOp::LessEq => l <= r,
        BinaryOp::Greater => l > r,
        _ => l >= r,
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    if left.kind != right.kind {
        return false;
    }
    match left.kind {
        ValueKind::Undefined | ValueKind::Null => true,
        ValueKind::Number => to_number(left) == to_number(right),
        _ if left.is_reference() || right.is_reference() => left.id == right.id,
        _ => left.text == right.text,
    }
}

fn is_nullish(value: &Value) -> bool {
    matches!(value.kind, ValueKind::Undefined | ValueKind::Null)
}

fn is_primitive(value: &Value) -> bool {
    matches!(
        value.kind,
        ValueKind::Boolean | ValueKind::Number | ValueKind::String
    )
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    if left.kind == right.kind {
        return strict_equals(left, right);
    }
    if is_nullish(left) || is_nullish(right) {
        return is_nullish(left) && is_nullish(right);
    }
    if is_primitive(left) && is_primitive(right) {
        return to_number(left) == to_number(right);
    }
    false
}
