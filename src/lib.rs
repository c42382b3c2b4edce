//! A reactive HTML template compiler for UI components.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Expressions: `{user.name}`, `{count > 1 ? 'items' : 'item'}`
//! - Conditionals: `{#if user.enabled} ... {:else} ... {/if}`, `{#unless}`
//! - Loops: `{#each todos as todo, i} ... {/each}`, `{#for (k, v) in map}`
//! - Raw markup and JSON: `{@html markup}`, `{@json value}`
//! - Dynamic attributes and events: `<li class={cls} onclick={remove(index)}>`
//! - The older double brace dialect `{{#if c}}...{{/if}}` is detected and
//!   converted automatically
//!
//! ### Engine
//!
//! - Templates are compiled once into a program and cached by source
//! - Every render action records which state fields it reads, so a state
//!   change only re-runs what depends on it
//! - Event handlers that capture loop items keep the item's identity
//! - Convenient macro for building state:
//!   `strand::value!{ todos: [{ text: "Ship it", done: false }] }`
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the global
//! functions and the compiled templates. Generally, you only need to
//! construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = strand::Engine::new();
//! ```
//!
//! Next, [`.compile`][Engine::compile] is used to compile a template. The
//! same source always returns the same template.
//!
//! ```
//! # let engine = strand::Engine::new();
//! let template = engine.compile("<p>Hello {user.name}!</p>")?;
//! assert!(std::rc::Rc::ptr_eq(&template, &engine.compile("<p>Hello {user.name}!</p>")?));
//! # Ok::<(), strand::Error>(())
//! ```
//!
//! Finally, the template is rendered against a [`Context`] which holds the
//! state and props of one instance.
//!
//! ```
//! # let engine = strand::Engine::new();
//! # let template = engine.compile("<p>Hello {user.name}!</p>")?;
//! let mut ctx = strand::Context::new(
//!     strand::value! { user: { name: "John Smith" } },
//!     strand::Value::None,
//! )?;
//! let tree = template.render(&mut ctx);
//! assert_eq!(tree.to_html(), "<p>Hello John Smith!</p>");
//! # Ok::<(), strand::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Update only what changed
//!
//! A [`Component`] keeps the render tree together with the context. Writing
//! the state through it re-runs only the actions that read the field.
//!
//! ```
//! use strand::{Component, Context, Engine, Value};
//!
//! let engine = Engine::new();
//! let template = engine.compile(
//!     "<h1>{title}</h1><ul>{#each todos as todo}<li>{todo}</li>{/each}</ul>",
//! )?;
//! let ctx = Context::new(
//!     strand::value! { title: "Todos", todos: ["a", "b"] },
//!     Value::None,
//! )?;
//!
//! let mut component = Component::new(template, ctx);
//! let ran = component.set("todos", Value::from(["c"]))?;
//! assert_eq!(ran.len(), 1);
//! assert_eq!(component.html(), "<h1>Todos</h1><ul><li>c</li></ul>");
//! # Ok::<(), strand::Error>(())
//! ```
//!
//! ### Add a global function
//!
//! ```
//! let mut engine = strand::Engine::new();
//! engine.add_function("shout", |args: &[strand::Value]| {
//!     args.first()
//!         .and_then(|v| v.as_str())
//!         .map(|s| s.to_uppercase())
//! });
//!
//! let mut ctx = strand::Context::new(strand::value! { name: "world" }, strand::Value::None)?;
//! let tree = engine.compile("<p>{shout(name)}</p>")?.render(&mut ctx);
//! assert_eq!(tree.to_html(), "<p>WORLD</p>");
//! # Ok::<(), strand::Error>(())
//! ```
//!
//! ### Inspect the compiled program
//!
//! ```
//! let engine = strand::Engine::new();
//! let template = engine.compile("{#if done}<s>{text}</s>{/if}")?;
//! println!("{}", template.program());
//! assert_eq!(template.dependencies().get("done").len(), 1);
//! # Ok::<(), strand::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod compile;
mod component;
mod dom;
mod error;
pub mod functions;
mod handlers;
mod macros;
mod render;
mod state;
mod types;
mod value;

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

pub use crate::compile::deps::DependencyMap;
pub use crate::component::Component;
pub use crate::dom::{Block, Element, EventBinding, Fragment, Node};
pub use crate::error::{Error, ErrorKind};
pub use crate::functions::{FunctionReturn, Functions};
pub use crate::handlers::{CapturedHandler, Handler, HandlerRegistry, HandlerToken};
pub use crate::render::{Context, Diagnostic, MethodFn};
pub use crate::state::State;
pub use crate::types::ast;
pub use crate::types::program::{
    Action, ActionId, ActionKind, EmitMode, HandlerSource, Instr, Program,
};
pub use crate::value::{to_value, IndexMap, List, Map, Value};

use crate::compile::legacy;
use crate::render::Renderer;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The compilation engine and template cache.
pub struct Engine {
    functions: Rc<Functions>,
    legacy: LegacySyntax,
    handler_capacity: usize,
    cache: RefCell<HashMap<String, Rc<Template>>>,
}

/// Compile options that only affect diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// The component name used in warnings and error headers.
    pub name: Option<String>,
}

/// How the engine treats templates written in the double brace dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LegacySyntax {
    /// Detect the dialect and convert it before compiling.
    #[default]
    Detect,
    /// Always compile the source as the primary syntax.
    Disabled,
}

/// A compiled template.
///
/// Templates are immutable and shared between all of their instances, see
/// [`Context`] for the per-instance state.
pub struct Template {
    /// The source the program spans point into, after any legacy
    /// conversion.
    source: String,
    name: Option<String>,
    program: Program,
    dependencies: Rc<DependencyMap>,
    functions: Rc<Functions>,
    handler_capacity: usize,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine.
    ///
    /// The builtin global functions are registered if the `builtins` feature
    /// is enabled.
    #[inline]
    pub fn new() -> Self {
        Self {
            functions: Rc::new(Functions::new()),
            legacy: LegacySyntax::default(),
            handler_capacity: handlers::DEFAULT_CAPACITY,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Add a global function that templates can call by name.
    ///
    /// A name containing a dot, e.g. `Math.clamp`, is called as a member of
    /// one of the builtin namespaces. This clears the template cache.
    pub fn add_function<F, R>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> R + 'static,
        R: FunctionReturn,
    {
        Rc::make_mut(&mut self.functions).insert(name, functions::new(f));
        self.clear_cache();
    }

    /// Set how the double brace dialect is handled. This clears the template
    /// cache.
    #[inline]
    pub fn set_legacy_syntax(&mut self, legacy: LegacySyntax) {
        self.legacy = legacy;
        self.clear_cache();
    }

    /// Set how many captured event handlers a context keeps before evicting
    /// the oldest. This clears the template cache.
    #[inline]
    pub fn set_handler_capacity(&mut self, capacity: usize) {
        self.handler_capacity = capacity;
        self.clear_cache();
    }

    /// Compile a template, or return the cached template for this source.
    #[inline]
    pub fn compile(&self, source: &str) -> Result<Rc<Template>> {
        self.compile_with(source, &Options::default())
    }

    /// Compile a template with options.
    ///
    /// The cache is keyed by source only, a cached template keeps the name
    /// it was first compiled with.
    pub fn compile_with(&self, source: &str, options: &Options) -> Result<Rc<Template>> {
        if let Some(template) = self.cache.borrow().get(source) {
            tracing::debug!(name = ?template.name, "template cache hit");
            return Ok(template.clone());
        }
        let template = Rc::new(self.compile_uncached(source, options)?);
        self.cache
            .borrow_mut()
            .insert(source.to_owned(), template.clone());
        Ok(template)
    }

    /// Compile a template without looking in or storing into the cache.
    pub fn compile_uncached(&self, source: &str, options: &Options) -> Result<Template> {
        let name = options.name.as_deref();
        let source = match self.legacy {
            LegacySyntax::Detect if legacy::detect(source) => {
                legacy::normalize(source, name).map_err(|e| e.with_template_name(name))?
            }
            _ => source.to_owned(),
        };
        let (program, dependencies) =
            compile::template(&source, &self.functions).map_err(|e| e.with_template_name(name))?;
        tracing::debug!(
            name = name.unwrap_or("anonymous"),
            instrs = program.instrs.len(),
            actions = program.actions.len(),
            "compiled template"
        );
        Ok(Template {
            source,
            name: options.name.clone(),
            program,
            dependencies: Rc::new(dependencies),
            functions: self.functions.clone(),
            handler_capacity: self.handler_capacity,
        })
    }

    /// Returns the number of cached templates.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Drops every cached template.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.functions)
            .field("legacy", &self.legacy)
            .field("handler_capacity", &self.handler_capacity)
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}

impl Template {
    /// Render the whole template.
    ///
    /// This replaces everything the context remembers from earlier renders:
    /// handler tokens are cleared, diagnostics are reset and the dependency
    /// map of this template is attached.
    pub fn render(&self, ctx: &mut Context) -> Fragment {
        ctx.handlers.clear();
        ctx.handlers.set_capacity(self.handler_capacity);
        ctx.diagnostics.clear();
        ctx.dependencies = Some(self.dependencies.clone());
        let nodes = Renderer::new(self, ctx).render();
        Fragment::new(nodes)
    }

    /// Re-run the parts of a rendered tree that read any of `fields`.
    ///
    /// `fragment` must have been rendered from this template with the same
    /// context. Returns the actions that ran.
    pub fn update<I, S>(
        &self,
        ctx: &mut Context,
        fragment: &mut Fragment,
        fields: I,
    ) -> Vec<ActionId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let actions: BTreeSet<ActionId> =
            self.dependencies.actions_for(fields).into_iter().collect();
        if actions.is_empty() {
            return Vec::new();
        }
        tracing::debug!(
            name = self.name.as_deref().unwrap_or("anonymous"),
            actions = actions.len(),
            "updating template"
        );
        Renderer::new(self, ctx).update(&mut fragment.nodes, &actions)
    }

    /// Returns the compiled program, its `Display` is a readable listing.
    #[inline]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the source the template was compiled from, after any legacy
    /// conversion.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns which actions read each state field.
    #[inline]
    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("actions", &self.program.actions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_compile_caches_by_source() {
        let engine = Engine::new();
        let a = engine.compile("<p>{x}</p>").unwrap();
        let b = engine.compile("<p>{x}</p>").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(engine.cached(), 1);
        let c = engine
            .compile_uncached("<p>{x}</p>", &Options::default())
            .unwrap();
        assert_eq!(c.source(), a.source());
        assert_eq!(engine.cached(), 1);
    }

    #[test]
    fn engine_compile_errors_are_not_cached() {
        let engine = Engine::new();
        assert!(engine.compile("{#if x}").is_err());
        assert_eq!(engine.cached(), 0);
    }

    #[test]
    fn engine_config_clears_cache() {
        let mut engine = Engine::new();
        engine.compile("<p></p>").unwrap();
        engine.set_legacy_syntax(LegacySyntax::Disabled);
        assert_eq!(engine.cached(), 0);
        engine.compile("<p></p>").unwrap();
        engine.add_function("one", |_: &[Value]| 1);
        assert_eq!(engine.cached(), 0);
        assert!(engine.functions().contains("one"));
    }

    #[test]
    fn engine_compile_with_name() {
        let engine = Engine::new();
        let options = Options {
            name: Some("todo-list".into()),
        };
        let template = engine.compile_with("<p>{x}</p>", &options).unwrap();
        assert_eq!(template.name(), Some("todo-list"));
        let err = engine.compile_with("{#if x}", &options).unwrap_err();
        assert_eq!(err.name(), Some("todo-list"));
    }

    #[test]
    fn engine_legacy_disabled() {
        let mut engine = Engine::new();
        let template = engine.compile("{{name}}").unwrap();
        assert_eq!(template.source(), "{name}");
        engine.set_legacy_syntax(LegacySyntax::Disabled);
        let template = engine.compile("{{name}}").unwrap();
        assert_eq!(template.source(), "{{name}}");
    }

    #[test]
    fn template_render_resets_context() {
        let engine = Engine::new();
        let template = engine
            .compile("{#each xs as x}<b onclick={() => pick(x)}>{x.y.z}</b>{/each}")
            .unwrap();
        let mut ctx = Context::new(value! { xs: [{ y: None }] }, Value::None).unwrap();
        template.render(&mut ctx);
        assert_eq!(ctx.handlers().len(), 1);
        assert_eq!(ctx.diagnostics().len(), 1);
        assert!(ctx.dependencies().is_some());
        template.render(&mut ctx);
        assert_eq!(ctx.handlers().len(), 1);
        assert_eq!(ctx.diagnostics().len(), 1);
    }

    #[test]
    fn template_update_without_dependents() {
        let engine = Engine::new();
        let template = engine.compile("<p>{a}</p>").unwrap();
        let mut ctx = Context::new(value! { a: 1, b: 2 }, Value::None).unwrap();
        let mut tree = template.render(&mut ctx);
        assert!(template.update(&mut ctx, &mut tree, ["b"]).is_empty());
    }
}
