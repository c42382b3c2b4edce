//! A rendered template bound to its context.

use std::rc::Rc;

use crate::compile::rewrite;
use crate::dom::Fragment;
use crate::error::ErrorKind;
use crate::handlers::Handler;
use crate::render::{Context, Env, Scope};
use crate::types::program::ActionId;
use crate::types::span::Span;
use crate::{Error, Result, Template, Value};

/// A template instance that keeps its render tree up to date.
///
/// Writes through [`Component::set`] and state changes made by event
/// handlers only re-run the parts of the tree that read the changed fields.
///
/// # Examples
///
/// ```
/// use strand::{Component, Context, Engine, Value};
///
/// let engine = Engine::new();
/// let template = engine.compile("<p>{count}</p><span>{title}</span>")?;
/// let ctx = Context::new(strand::value! { count: 1, title: "x" }, Value::None)?;
///
/// let mut component = Component::new(template, ctx);
/// assert_eq!(component.html(), "<p>1</p><span>x</span>");
///
/// let ran = component.set("count", 2)?;
/// assert_eq!(ran.len(), 1);
/// assert_eq!(component.html(), "<p>2</p><span>x</span>");
/// # Ok::<(), strand::Error>(())
/// ```
#[derive(Debug)]
pub struct Component {
    template: Rc<Template>,
    context: Context,
    tree: Fragment,
}

impl Component {
    /// Renders the template and wraps the result.
    pub fn new(template: Rc<Template>, mut context: Context) -> Self {
        let tree = template.render(&mut context);
        context.state.take_dirty();
        Self {
            template,
            context,
            tree,
        }
    }

    /// Throws away the current tree and renders it again from scratch.
    pub fn render(&mut self) {
        self.tree = self.template.render(&mut self.context);
        self.context.state.take_dirty();
    }

    pub fn template(&self) -> &Rc<Template> {
        &self.template
    }

    pub fn tree(&self) -> &Fragment {
        &self.tree
    }

    pub fn html(&self) -> String {
        self.tree.to_html()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the context.
    ///
    /// State written here is rendered by the next [`Component::flush`].
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Reads a dotted path from the state.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.context.state.get(path)
    }

    /// Writes a dotted path in the state and updates the tree.
    ///
    /// Returns the actions that ran.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<Vec<ActionId>> {
        self.context.state.set(path, value)?;
        Ok(self.flush())
    }

    /// Re-runs the actions that depend on the fields written since the last
    /// flush.
    pub fn flush(&mut self) -> Vec<ActionId> {
        let dirty = self.context.state.take_dirty();
        if dirty.is_empty() {
            return Vec::new();
        }
        self.template.update(&mut self.context, &mut self.tree, &dirty)
    }

    /// Invokes an event handler found in the tree.
    ///
    /// The tree is updated for any state the handler wrote, even if it
    /// failed part way.
    ///
    /// # Examples
    ///
    /// ```
    /// use strand::{Component, Context, Engine, State, Value};
    ///
    /// let engine = Engine::new();
    /// let template = engine.compile("<button onclick={increment}>{count}</button>")?;
    /// let mut ctx = Context::new(strand::value! { count: 0 }, Value::None)?;
    /// ctx.add_method("increment", |state: &mut State, _: &[Value]| {
    ///     let count = match state.get("count") {
    ///         Some(Value::Integer(n)) => *n,
    ///         _ => 0,
    ///     };
    ///     state.set("count", count + 1)
    /// });
    ///
    /// let mut component = Component::new(template, ctx);
    /// let handler = component.tree().events()[0].handler.clone();
    /// component.dispatch(&handler, Value::None)?;
    /// assert_eq!(component.html(), r#"<button onclick="this.increment">1</button>"#);
    /// # Ok::<(), strand::Error>(())
    /// ```
    pub fn dispatch(&mut self, handler: &Handler, event: Value) -> Result<Value> {
        let result = self.invoke(handler, event);
        self.flush();
        result
    }

    fn invoke(&mut self, handler: &Handler, event: Value) -> Result<Value> {
        let template = &*self.template;
        let ctx = &mut self.context;
        let result = match handler {
            Handler::Inline(code) => {
                if code.trim().is_empty() {
                    return Err(Error::message(ErrorKind::Syntax, "empty event handler"));
                }
                let source = rewrite::parse_handler(
                    code,
                    Span::from(0..code.len()),
                    &template.functions,
                    &[],
                )?;
                Env {
                    source: code,
                    functions: &template.functions,
                    state: &mut ctx.state,
                    props: &ctx.props,
                    methods: &ctx.methods,
                    scope: &Scope::default(),
                }
                .invoke(&source.expr, event)
            }
            Handler::Token(token) => {
                let captured = ctx.handlers.take(*token).ok_or_else(|| {
                    Error::message(ErrorKind::Eval, format!("unknown handler token {token}"))
                })?;
                let mut scope = Scope::default();
                for (name, value) in &captured.locals {
                    scope.push(name, value.clone(), false);
                }
                tracing::trace!(token = %token, code = %captured.code(), "invoking handler");
                Env {
                    source: &template.source,
                    functions: &template.functions,
                    state: &mut ctx.state,
                    props: &ctx.props,
                    methods: &ctx.methods,
                    scope: &scope,
                }
                .invoke(&captured.source.expr, event)
            }
        };
        result.map_err(|err| err.with_template_name(template.name.as_deref()))
    }
}
