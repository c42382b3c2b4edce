//! Interprets a compiled program into a render tree.

mod core;
mod eval;
mod iter;
mod stack;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::compile::deps::DependencyMap;
use crate::error::ErrorKind;
use crate::functions::FunctionReturn;
use crate::handlers::{CapturedHandler, HandlerRegistry};
use crate::state::State;
use crate::types::program::ActionId;
use crate::{Error, Result, Value};

pub(crate) use crate::render::core::Renderer;
pub(crate) use crate::render::eval::Env;
pub(crate) use crate::render::stack::Scope;

/// An instance method callable from templates and event handlers.
pub type MethodFn = dyn Fn(&mut State, &[Value]) -> Result<Value> + 'static;

/// Everything that belongs to one instance of a rendered template.
///
/// A [`Template`][crate::Template] is shared between all of its instances,
/// the state, methods, issued handler tokens and render diagnostics live
/// here.
pub struct Context {
    pub(crate) state: State,
    pub(crate) props: Value,
    pub(crate) methods: BTreeMap<String, Rc<MethodFn>>,
    pub(crate) handlers: HandlerRegistry<CapturedHandler>,
    pub(crate) dependencies: Option<Rc<DependencyMap>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// An expression that failed while rendering.
///
/// The failing action renders empty and the rest of the render continues.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub action: ActionId,
    /// The expression as rewritten by the compiler.
    pub code: String,
    pub error: Error,
}

impl Context {
    /// Construct a new context.
    ///
    /// `state` must be a map, `props` must be a map or `null`.
    pub fn new(state: Value, props: Value) -> Result<Self> {
        let props = match props {
            Value::None => Value::new_map(),
            props @ Value::Map(_) => props,
            props => {
                return Err(Error::message(
                    ErrorKind::Eval,
                    format!("expected props to be a map, found {}", props.human()),
                ))
            }
        };
        Ok(Self {
            state: State::new(state)?,
            props,
            methods: BTreeMap::new(),
            handlers: HandlerRegistry::new(),
            dependencies: None,
            diagnostics: Vec::new(),
        })
    }

    /// Add an instance method.
    ///
    /// Methods are called by bare calls in expressions, `remove(index)` or
    /// `this.remove(index)`, and by event handlers. A method may write the
    /// state, changed fields are re-rendered after an event is dispatched.
    ///
    /// # Examples
    ///
    /// ```
    /// use strand::{Context, State, Value};
    ///
    /// let mut ctx = Context::new(strand::value! { count: 0 }, Value::None)?;
    /// ctx.add_method("increment", |state: &mut State, _: &[Value]| {
    ///     let count = match state.get("count") {
    ///         Some(Value::Integer(n)) => *n,
    ///         _ => 0,
    ///     };
    ///     state.set("count", count + 1)
    /// });
    /// # Ok::<(), strand::Error>(())
    /// ```
    pub fn add_method<F, R>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut State, &[Value]) -> R + 'static,
        R: FunctionReturn,
    {
        self.methods.insert(
            name.into(),
            Rc::new(move |state: &mut State, args: &[Value]| f(state, args).to_value()),
        );
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access to the state.
    ///
    /// Writes made here are only rendered by a later update, see
    /// [`Component::set`][crate::Component::set].
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    pub fn handlers(&self) -> &HandlerRegistry<CapturedHandler> {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry<CapturedHandler> {
        &mut self.handlers
    }

    /// The dependency map of the template last rendered with this context.
    pub fn dependencies(&self) -> Option<&DependencyMap> {
        self.dependencies.as_deref()
    }

    /// The errors recovered from since the last full render.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("props", &self.props)
            .field("methods", &self.methods.keys())
            .field("handlers", &self.handlers)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::value;

    #[test]
    fn context_new_checks_shapes() {
        assert!(Context::new(value! {}, Value::None).is_ok());
        let err = Context::new(Value::from(1), Value::None).unwrap_err();
        assert_eq!(err.to_string(), "expected state to be a map, found integer");
        let err = Context::new(value! {}, Value::from("x")).unwrap_err();
        assert_eq!(err.to_string(), "expected props to be a map, found string");
    }

    #[test]
    fn context_add_method() {
        let mut ctx = Context::new(value! { n: 1 }, Value::None).unwrap();
        ctx.add_method("double", |state: &mut State, _: &[Value]| -> Result<Value> {
            let n = state.get("n").cloned().unwrap_or_default();
            state.set("n", crate::value::number(n.to_number() * 2.0))?;
            Ok(Value::None)
        });
        ctx.add_method("fail", |_: &mut State, _: &[Value]| Err::<Value, _>("nope"));
        assert!(ctx.has_method("double"));

        let f = ctx.methods["double"].clone();
        f(&mut ctx.state, &[]).unwrap();
        assert_eq!(ctx.state().get("n"), Some(&Value::from(2)));

        let f = ctx.methods["fail"].clone();
        let err = f(&mut ctx.state, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Method);
    }
}
