//! Stack, scope, variable and expression inspection.

use tracing::{debug, warn};

use swfdap_core::{NativeSession, Value, ValueKind, Variable, Visibility, MAIN_CONTEXT};
use swfdap_protocol::message;
use swfdap_protocol::{
    EvaluateArguments, EvaluateResponseBody, ExceptionDetails, ExceptionInfoArguments,
    ExceptionInfoResponseBody, Request, Response, Scope, ScopesArguments, ScopesResponseBody,
    SetVariableArguments, SetVariableResponseBody, StackFrame, StackTraceArguments,
    StackTraceResponseBody, VariablePresentationHint, VariablesArguments, VariablesResponseBody,
};

use super::{context_id, DebugSession};
use crate::error::AdapterError;
use crate::expression::NativeExpressionContext;
use crate::literal::parse_literal;
use crate::reference::{
    decode_frame_ref, decode_value_ref, encode_frame_ref, encode_value_ref, ValueRef,
    FRAME_BASE, LOCALS_VALUE_ID,
};

/// How a listed variable is reached from an expression, for
/// `evaluateName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Frame,
    This,
    Other,
}

/// `filter`, `start` and `count` of a `variables` request.
#[derive(Debug, Clone, Default)]
struct Paging {
    filter: Option<String>,
    start: Option<i64>,
    count: Option<i64>,
}

enum SetOutcome {
    Updated(SetVariableResponseBody),
    Fault(String),
    Failed,
}

impl DebugSession {
    pub(super) async fn stack_trace(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: StackTraceArguments = request.parse_arguments()?;
        let context = match self.addressed_context(args.thread_id, true).await {
            Ok(context) => context,
            Err(text) => return Ok(Response::failure(request, text)),
        };
        let native = self.native().await?;
        let sources = self.state.lock().await.sources.clone();

        let frames = self
            .run_native("stackTrace", move || native.frames(context))
            .await?;
        // Frames past the reference range cannot be addressed later.
        let total = frames.len().min(FRAME_BASE as usize);
        if total < frames.len() {
            debug!(context, frames = frames.len(), "stack truncated to addressable frames");
        }
        let start = usize::try_from(args.start_frame.unwrap_or(0)).unwrap_or(0);
        let levels = args
            .levels
            .and_then(|levels| usize::try_from(levels).ok())
            .filter(|levels| *levels > 0)
            .unwrap_or(total);

        let mut stack_frames = Vec::new();
        for (index, frame) in frames
            .into_iter()
            .enumerate()
            .take(total)
            .skip(start)
            .take(levels)
        {
            let location = frame.location.as_ref();
            stack_frames.push(StackFrame {
                id: encode_frame_ref(context, index)?,
                name: frame.call_signature,
                source: location
                    .and_then(|l| l.file.as_ref())
                    .map(|file| sources.to_source(file)),
                line: location.map_or(0, |l| i64::from(l.line)),
                column: 1,
            });
        }

        Ok(Response::success(
            request,
            Some(StackTraceResponseBody {
                stack_frames,
                total_frames: Some(total as i64),
            }),
        ))
    }

    pub(super) async fn scopes(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: ScopesArguments = request.parse_arguments()?;
        let frame = decode_frame_ref(args.frame_id)?;
        if let Err(text) = self.addressed_context(i64::from(frame.context), true).await {
            return Ok(Response::failure(request, text));
        }

        let thrown = {
            let state = self.state.lock().await;
            state
                .contexts
                .get(frame.context)
                .and_then(|c| c.last_fault.as_ref())
                .and_then(|fault| fault.thrown.as_ref())
                .and_then(|value| value.id)
                .filter(|id| *id != LOCALS_VALUE_ID)
        };

        let mut scopes = Vec::new();
        if let Some(id) = thrown {
            scopes.push(Scope {
                name: "Exception".to_string(),
                variables_reference: encode_value_ref(frame.context, frame.frame, id)?,
                expensive: false,
            });
        }
        scopes.push(Scope {
            name: "Locals".to_string(),
            variables_reference: encode_value_ref(frame.context, frame.frame, LOCALS_VALUE_ID)?,
            expensive: false,
        });
        Ok(Response::success(request, Some(ScopesResponseBody { scopes })))
    }

    pub(super) async fn variables(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: VariablesArguments = request.parse_arguments()?;
        let reference = decode_value_ref(args.variables_reference)?;
        if let Err(text) = self.addressed_context(i64::from(reference.context), true).await {
            return Ok(Response::failure(request, text));
        }
        let native = self.native().await?;
        let paging = Paging {
            filter: args.filter,
            start: args.start,
            count: args.count,
        };

        let variables = self
            .run_native("variables", move || {
                list_variables(native.as_ref(), reference, &paging)
            })
            .await?;
        Ok(Response::success(request, Some(VariablesResponseBody { variables })))
    }

    pub(super) async fn set_variable(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: SetVariableArguments = request.parse_arguments()?;
        let reference = decode_value_ref(args.variables_reference)?;
        let Some((kind, text)) = parse_literal(&args.value).assignment() else {
            return Ok(Response::error(
                request,
                message::invalid_variable_value(&args.value),
            ));
        };
        if let Err(text) = self.addressed_context(i64::from(reference.context), true).await {
            return Ok(Response::failure(request, text));
        }
        let native = self.native().await?;

        let name = args.name.clone();
        let outcome = self
            .run_native("setVariable", move || {
                assign_variable(native.as_ref(), reference, &name, kind, &text)
            })
            .await?;

        Ok(match outcome {
            SetOutcome::Updated(body) => Response::success(request, Some(body)),
            SetOutcome::Fault(fault) => Response::failure(request, fault),
            SetOutcome::Failed => {
                Response::failure(request, format!("Failed to set value of '{}'", args.name))
            }
        })
    }

    pub(super) async fn evaluate(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: EvaluateArguments = request.parse_arguments()?;
        let (context, frame) = match args.frame_id {
            Some(id) => {
                let frame = decode_frame_ref(id)?;
                (frame.context, Some(frame.frame))
            }
            None => (MAIN_CONTEXT, None),
        };
        {
            let state = self.state.lock().await;
            match state.contexts.get(context) {
                None => {
                    return Ok(Response::failure(
                        request,
                        format!("Unknown thread id: {context}"),
                    ))
                }
                Some(c) if !c.suspended => {
                    return Ok(Response::failure(
                        request,
                        "Must be paused to evaluate expressions",
                    ))
                }
                Some(_) => {}
            }
        }
        let native = self.native().await?;
        let evaluator = self.evaluator.clone();
        let expression = args.expression.clone();

        let value = self
            .run_native("evaluate", move || -> Result<Option<Value>, AdapterError> {
                let evaluated = frame.and_then(|frame| {
                    let scope = NativeExpressionContext::for_frame(native.clone(), context, frame);
                    match evaluator.evaluate(&expression, &scope) {
                        Ok(evaluated) => Some(evaluated.into_value()),
                        Err(e) => {
                            debug!(expression = %expression, error = %e, "evaluation failed");
                            None
                        }
                    }
                });
                if evaluated.is_some() {
                    return Ok(evaluated);
                }
                Ok(native.global(context, &expression).unwrap_or_else(|e| {
                    debug!(expression = %expression, error = %e, "global lookup failed");
                    None
                }))
            })
            .await?;

        let body = match value {
            Some(value) => EvaluateResponseBody {
                result: display_value(&value),
                result_type: Some(value.type_name.clone()),
                variables_reference: match value.id {
                    Some(id) => encode_value_ref(context, frame.unwrap_or(0), id)?,
                    None => 0,
                },
            },
            None => EvaluateResponseBody {
                result: "undefined".to_string(),
                result_type: None,
                variables_reference: 0,
            },
        };
        Ok(Response::success(request, Some(body)))
    }

    pub(super) async fn exception_info(&mut self, request: &Request) -> Result<Response, AdapterError> {
        let args: ExceptionInfoArguments = request.parse_arguments()?;
        let state = self.state.lock().await;
        let Some(context) = context_id(args.thread_id).and_then(|id| state.contexts.get(id)) else {
            return Ok(Response::failure(
                request,
                format!("Unknown thread id: {}", args.thread_id),
            ));
        };
        let Some(fault) = context.last_fault.clone() else {
            return Ok(Response::failure(request, "No exception information available"));
        };

        let type_name = fault
            .thrown
            .as_ref()
            .map(|value| value.type_name.clone())
            .filter(|name| !name.is_empty());
        let body = ExceptionInfoResponseBody {
            exception_id: type_name.clone().unwrap_or_else(|| "Error".to_string()),
            description: Some(fault.message.clone()),
            break_mode: "always".to_string(),
            details: Some(ExceptionDetails {
                message: Some(fault.message),
                type_name,
                stack_trace: Some(fault.stack_trace).filter(|s| !s.is_empty()),
            }),
        };
        Ok(Response::success(request, Some(body)))
    }
}

fn list_variables(
    native: &dyn NativeSession,
    reference: ValueRef,
    paging: &Paging,
) -> Result<Vec<swfdap_protocol::Variable>, AdapterError> {
    let (context, frame) = (reference.context, reference.frame);
    let (variables, parent) = if reference.is_locals() {
        let mut variables: Vec<Variable> = native.frame_this(context, frame)?.into_iter().collect();
        variables.extend(native.frame_arguments(context, frame)?);
        variables.extend(native.frame_locals(context, frame)?);
        (variables, Parent::Frame)
    } else {
        let this_id = native
            .frame_this(context, frame)
            .ok()
            .flatten()
            .and_then(|this| this.value.id);
        let parent = if this_id == Some(reference.value) {
            Parent::This
        } else {
            Parent::Other
        };
        (native.members(context, reference.value)?, parent)
    };

    let variables = page(
        variables.into_iter().filter(|v| !v.attributes.is_static).collect(),
        paging,
    );
    variables
        .iter()
        .map(|variable| to_protocol_variable(native, reference, variable, parent))
        .collect()
}

fn is_index(name: &str) -> bool {
    name.parse::<u64>().is_ok()
}

/// Applies the `indexed`/`named` filter. Indexed members are kept when
/// their numeric name lies in `[start, start + count)` and come back in
/// ascending numeric order; a zero or missing count leaves the range open.
fn page(variables: Vec<Variable>, paging: &Paging) -> Vec<Variable> {
    match paging.filter.as_deref() {
        Some("indexed") => {
            let start = paging.start.and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
            let end = paging
                .count
                .and_then(|c| u64::try_from(c).ok())
                .filter(|c| *c > 0)
                .map(|c| start.saturating_add(c));
            let mut indexed: Vec<(u64, Variable)> = variables
                .into_iter()
                .filter_map(|v| v.name.parse::<u64>().ok().map(|index| (index, v)))
                .filter(|(index, _)| *index >= start && end.map_or(true, |end| *index < end))
                .collect();
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, v)| v).collect()
        }
        Some("named") => variables.into_iter().filter(|v| !is_index(&v.name)).collect(),
        _ => variables,
    }
}

fn to_protocol_variable(
    native: &dyn NativeSession,
    reference: ValueRef,
    variable: &Variable,
    parent: Parent,
) -> Result<swfdap_protocol::Variable, AdapterError> {
    let value = &variable.value;
    let (variables_reference, named, indexed) = match value.id {
        // Id 1 would read back as the frame's locals.
        Some(id) if id != 0 && id != LOCALS_VALUE_ID => {
            let children = native
                .members(reference.context, id)
                .unwrap_or_else(|e| {
                    warn!(error = %e, name = %variable.name, "could not count members");
                    Vec::new()
                });
            let indexed = children.iter().filter(|c| is_index(&c.name)).count();
            (
                encode_value_ref(reference.context, reference.frame, id)?,
                Some((children.len() - indexed) as i64),
                Some(indexed as i64),
            )
        }
        _ => (0, None, None),
    };

    let evaluate_name = match parent {
        Parent::Frame => Some(variable.name.clone()),
        Parent::This if is_index(&variable.name) => Some(format!("this[{}]", variable.name)),
        Parent::This => Some(format!("this.{}", variable.name)),
        Parent::Other => None,
    };

    Ok(swfdap_protocol::Variable {
        name: variable.name.clone(),
        value: display_value(value),
        variable_type: Some(value.type_name.clone()).filter(|t| !t.is_empty()),
        variables_reference,
        evaluate_name,
        presentation_hint: presentation_hint(variable),
        named_variables: named,
        indexed_variables: indexed,
    })
}

fn presentation_hint(variable: &Variable) -> Option<VariablePresentationHint> {
    let visibility = match variable.visibility {
        Visibility::Public => Some("public"),
        Visibility::Private => Some("private"),
        Visibility::Protected => Some("protected"),
        Visibility::Internal => Some("internal"),
        Visibility::Unspecified => None,
    };
    let attributes = &variable.attributes;
    let mut names = Vec::new();
    if attributes.is_static {
        names.push("static".to_string());
    }
    if attributes.is_const {
        names.push("constant".to_string());
    }
    if attributes.read_only {
        names.push("readOnly".to_string());
    }
    if visibility.is_none() && names.is_empty() {
        return None;
    }
    Some(VariablePresentationHint {
        kind: None,
        attributes: names,
        visibility: visibility.map(str::to_string),
    })
}

/// Strings are shown quoted, object-like values by their type name.
pub(crate) fn display_value(value: &Value) -> String {
    match value.kind {
        ValueKind::String => format!("\"{}\"", value.text),
        _ if value.is_reference() => value.type_name.clone(),
        _ => value.text.clone(),
    }
}

fn find_variable(
    native: &dyn NativeSession,
    reference: ValueRef,
    name: &str,
) -> Result<Option<Variable>, AdapterError> {
    let variables = if reference.is_locals() {
        let mut variables = native.frame_arguments(reference.context, reference.frame)?;
        variables.extend(native.frame_locals(reference.context, reference.frame)?);
        variables
    } else {
        native.members(reference.context, reference.value)?
    };
    Ok(variables.into_iter().find(|v| v.name == name))
}

fn assign_variable(
    native: &dyn NativeSession,
    reference: ValueRef,
    name: &str,
    kind: ValueKind,
    text: &str,
) -> Result<SetOutcome, AdapterError> {
    let Some(variable) = find_variable(native, reference, name)? else {
        return Ok(SetOutcome::Failed);
    };
    match native.set_value(reference.context, &variable, kind, text) {
        Ok(Some(fault)) => return Ok(SetOutcome::Fault(fault.message)),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, name, "set value failed");
            return Ok(SetOutcome::Failed);
        }
    }

    let Some(updated) = find_variable(native, reference, name)? else {
        return Ok(SetOutcome::Failed);
    };
    let value = updated.value;
    Ok(SetOutcome::Updated(SetVariableResponseBody {
        value: display_value(&value),
        value_type: Some(value.type_name.clone()),
        variables_reference: match value.id {
            Some(id) => encode_value_ref(reference.context, reference.frame, id)?,
            None => 0,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new(name, Value::number(1.0))
    }

    fn names(variables: &[Variable]) -> Vec<&str> {
        variables.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn strings_are_quoted_and_objects_show_type() {
        assert_eq!(display_value(&Value::string("hi")), "\"hi\"");
        assert_eq!(display_value(&Value::object(7, "flash.display::Sprite")), "flash.display::Sprite");
        assert_eq!(display_value(&Value::number(42.0)), "42");
    }

    #[test]
    fn indexed_filter_sorts_numerically() {
        let vars = vec![var("10"), var("length"), var("2"), var("0")];
        let paging = Paging {
            filter: Some("indexed".into()),
            ..Paging::default()
        };
        assert_eq!(names(&page(vars, &paging)), vec!["0", "2", "10"]);
    }

    #[test]
    fn named_filter_drops_indices_and_ignores_range() {
        let vars = vec![var("a"), var("0"), var("b"), var("c")];
        let paging = Paging {
            filter: Some("named".into()),
            start: Some(1),
            count: Some(1),
        };
        assert_eq!(names(&page(vars, &paging)), vec!["a", "b", "c"]);
    }

    #[test]
    fn indexed_range_selects_by_member_name_in_sparse_arrays() {
        let vars = vec![var("0"), var("5"), var("10"), var("11")];
        let paging = Paging {
            filter: Some("indexed".into()),
            start: Some(5),
            count: Some(2),
        };
        assert_eq!(names(&page(vars.clone(), &paging)), vec!["5"]);

        let paging = Paging {
            filter: Some("indexed".into()),
            start: Some(6),
            count: Some(0),
        };
        assert_eq!(names(&page(vars.clone(), &paging)), vec!["10", "11"]);

        let paging = Paging {
            filter: Some("indexed".into()),
            start: Some(1),
            count: Some(4),
        };
        assert!(page(vars, &paging).is_empty());
    }

    #[test]
    fn unfiltered_listing_ignores_range() {
        let vars = vec![var("a"), var("0"), var("b")];
        let paging = Paging {
            filter: None,
            start: Some(2),
            count: Some(1),
        };
        assert_eq!(names(&page(vars, &paging)), vec!["a", "0", "b"]);
    }

    #[test]
    fn hint_lists_visibility_and_attributes() {
        let mut variable = var("MAX");
        variable.visibility = Visibility::Private;
        variable.attributes.is_const = true;
        let hint = presentation_hint(&variable).unwrap();
        assert_eq!(hint.visibility.as_deref(), Some("private"));
        assert_eq!(hint.attributes, vec!["constant".to_string()]);
        assert!(presentation_hint(&var("plain")).is_none());
    }
}
