//! Name resolution against the native debugger.

use std::sync::Arc;

use tracing::warn;

use swfdap_core::{ContextId, NativeError, NativeSession, Value, ValueKind, Variable};

use super::ExpressionError;

/// What an evaluator may ask of the runtime.
pub trait ExpressionContext: Send {
    /// Resolves a bare name in this context.
    fn lookup(&self, name: &str) -> Result<Variable, ExpressionError>;

    /// Members of an object-like value; empty for primitives.
    fn lookup_members(&self, target: &Value) -> Result<Vec<Variable>, ExpressionError>;

    /// A context resolving names as members of `target`, if it has any.
    fn create_context(&self, target: &Variable) -> Option<Box<dyn ExpressionContext>>;

    /// Writes `value` into `target`. Failures are logged only.
    fn assign(&self, target: &Variable, value: &Value);

    /// Current value of `target`.
    fn to_value(&self, target: &Variable) -> Option<Value>;
}

#[derive(Debug, Clone)]
enum Scope {
    Frame(usize),
    Object(Variable),
}

/// Resolves names inside one frame of a suspended context, or inside the
/// members of one variable.
pub struct NativeExpressionContext {
    native: Arc<dyn NativeSession>,
    context: ContextId,
    scope: Scope,
}

impl NativeExpressionContext {
    pub fn for_frame(native: Arc<dyn NativeSession>, context: ContextId, frame: usize) -> Self {
        Self {
            native,
            context,
            scope: Scope::Frame(frame),
        }
    }

    pub fn for_variable(native: Arc<dyn NativeSession>, context: ContextId, variable: Variable) -> Self {
        Self {
            native,
            context,
            scope: Scope::Object(variable),
        }
    }

    fn members_of(&self, value: &Value) -> Result<Vec<Variable>, NativeError> {
        match value.id {
            Some(id) => self.native.members(self.context, id),
            None => Ok(Vec::new()),
        }
    }

    fn find_member(&self, value: &Value, name: &str) -> Result<Option<Variable>, NativeError> {
        Ok(self
            .members_of(value)?
            .into_iter()
            .find(|m| m.name == name))
    }

    fn lookup_in_frame(&self, frame: usize, name: &str) -> Result<Option<Variable>, NativeError> {
        let this = self.native.frame_this(self.context, frame)?;
        if name == "this" {
            return Ok(this);
        }
        if let Some(found) = self
            .native
            .frame_arguments(self.context, frame)?
            .into_iter()
            .find(|v| v.name == name)
        {
            return Ok(Some(found));
        }
        if let Some(found) = self
            .native
            .frame_locals(self.context, frame)?
            .into_iter()
            .find(|v| v.name == name)
        {
            return Ok(Some(found));
        }
        if let Some(this) = &this {
            if let Some(found) = self.find_member(&this.value, name)? {
                return Ok(Some(found));
            }
        }
        for scope in self.native.frame_scope_chain(self.context, frame)? {
            if let Some(found) = self.find_member(&scope.value, name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

impl ExpressionContext for NativeExpressionContext {
    fn lookup(&self, name: &str) -> Result<Variable, ExpressionError> {
        let found = match &self.scope {
            Scope::Frame(frame) => self.lookup_in_frame(*frame, name),
            Scope::Object(variable) => self.find_member(&variable.value, name),
        };
        match found {
            Ok(Some(variable)) => Ok(variable),
            Ok(None) => Err(ExpressionError::NoSuchVariable(name.to_string())),
            Err(e) => {
                warn!(name, error = %e, "variable lookup failed");
                Err(ExpressionError::NoSuchVariable(name.to_string()))
            }
        }
    }

    fn lookup_members(&self, target: &Value) -> Result<Vec<Variable>, ExpressionError> {
        self.members_of(target)
            .map_err(|e| ExpressionError::Type(format!("cannot list members: {e}")))
    }

    fn create_context(&self, target: &Variable) -> Option<Box<dyn ExpressionContext>> {
        if !target.value.is_reference() {
            return None;
        }
        Some(Box::new(NativeExpressionContext::for_variable(
            self.native.clone(),
            self.context,
            target.clone(),
        )))
    }

    fn assign(&self, target: &Variable, value: &Value) {
        let kind = match value.kind {
            ValueKind::Boolean | ValueKind::Number | ValueKind::String => value.kind,
            // Only primitive assignments reach the runtime as literals.
            _ => ValueKind::String,
        };
        match self.native.set_value(self.context, target, kind, &value.text) {
            Ok(None) => {}
            Ok(Some(fault)) => {
                warn!(name = %target.name, fault = %fault.message, "assignment raised a fault")
            }
            Err(e) => warn!(name = %target.name, error = %e, "assignment failed"),
        }
    }

    fn to_value(&self, target: &Variable) -> Option<Value> {
        match target.value.id {
            Some(id) => match self.native.value(self.context, id) {
                Ok(Some(value)) => Some(value),
                Ok(None) | Err(_) => Some(target.value.clone()),
            },
            None => Some(target.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swfdap_core::sim::{SimFrame, SimulatedSession};
    use swfdap_core::{SuspendReason, VariableOwner, MAIN_CONTEXT};

    fn session() -> Arc<SimulatedSession> {
        let session = Arc::new(SimulatedSession::new());
        let mut frame = SimFrame::new("Main/run()", None);
        frame.this = Some(Variable::new("this", Value::object(10, "Main")));
        frame.arguments.push(Variable::new("count", Value::number(1.0)));
        frame.locals.push(Variable::new("count", Value::number(99.0)));
        frame.locals.push(Variable::new("label", Value::string("hi")));
        frame.scope_chain.push(Variable::new("scope", Value::object(20, "global")));
        session.set_frames(MAIN_CONTEXT, vec![frame]);
        session.add_object(
            Value::object(10, "Main"),
            vec![
                Variable::new("width", Value::number(640.0)),
                Variable::new("child", Value::object(11, "Sprite")),
            ],
        );
        session.add_object(Value::object(11, "Sprite"), vec![Variable::new("x", Value::number(5.0))]);
        session.add_object(Value::object(20, "global"), vec![Variable::new("VERSION", Value::string("1.0"))]);
        session.halt(MAIN_CONTEXT, SuspendReason::Breakpoint);
        session
    }

    fn frame_context(session: &Arc<SimulatedSession>) -> NativeExpressionContext {
        NativeExpressionContext::for_frame(session.clone(), MAIN_CONTEXT, 0)
    }

    #[test]
    fn arguments_shadow_locals() {
        let ctx = frame_context(&session());
        assert_eq!(ctx.lookup("count").unwrap().value.text, "1");
        assert_eq!(ctx.lookup("label").unwrap().value.text, "hi");
    }

    #[test]
    fn falls_back_to_this_then_scope_chain() {
        let ctx = frame_context(&session());
        assert_eq!(ctx.lookup("this").unwrap().value.id, Some(10));
        assert_eq!(ctx.lookup("width").unwrap().value.text, "640");
        assert_eq!(ctx.lookup("VERSION").unwrap().value.text, "1.0");
        assert_eq!(
            ctx.lookup("nope"),
            Err(ExpressionError::NoSuchVariable("nope".into()))
        );
    }

    #[test]
    fn member_context_resolves_members() {
        let ctx = frame_context(&session());
        let child = ctx.lookup("child").unwrap();
        let inner = ctx.create_context(&child).unwrap();
        assert_eq!(inner.lookup("x").unwrap().value.text, "5");
        assert!(ctx.create_context(&ctx.lookup("label").unwrap()).is_none());
    }

    #[test]
    fn assign_writes_back_to_runtime() {
        let session = session();
        let ctx = frame_context(&session);
        let label = ctx.lookup("label").unwrap();
        assert_eq!(label.owner, VariableOwner::Frame(0));
        ctx.assign(&label, &Value::string("bye"));
        assert_eq!(ctx.lookup("label").unwrap().value.text, "bye");
    }

    #[test]
    fn running_context_resolves_nothing() {
        let session = Arc::new(SimulatedSession::new());
        let ctx = frame_context(&session);
        assert!(ctx.lookup("anything").is_err());
    }
}
