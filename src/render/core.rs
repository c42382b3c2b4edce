use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::rc::Rc;

use crate::compile::rewrite;
use crate::dom::{AttrBinding, Block, Element, EventBinding, Node};
use crate::handlers::{CapturedHandler, Handler};
use crate::render::eval::Env;
use crate::render::iter::LoopState;
use crate::render::stack::Scope;
use crate::render::{Context, Diagnostic};
use crate::types::ast::Expr;
use crate::types::program::{ActionId, EmitMode, HandlerSource, Instr};
use crate::value;
use crate::{Error, Result, Template, Value};

/// Interprets the program of a template against a context.
pub struct Renderer<'a> {
    template: &'a Template,
    ctx: &'a mut Context,
    loops: Vec<LoopState>,
    /// The conditional chains being rendered, innermost last.
    conditionals: Vec<ActionId>,
}

/// The nodes produced by a run, plus the elements that are still open.
struct Output {
    nodes: Vec<Node>,
    open: Vec<Element>,
}

impl<'a> Renderer<'a> {
    pub fn new(template: &'a Template, ctx: &'a mut Context) -> Self {
        Self {
            template,
            ctx,
            loops: Vec::new(),
            conditionals: Vec::new(),
        }
    }

    /// Renders the whole program.
    pub fn render(&mut self) -> Vec<Node> {
        let end = self.template.program.instrs.len();
        self.run(0, end, &mut Scope::default())
    }

    /// Executes the instructions in `pc..end`.
    fn run(&mut self, mut pc: usize, end: usize, scope: &mut Scope) -> Vec<Node> {
        let template = self.template;
        let instrs = &template.program.instrs;
        let mut out = Output {
            nodes: Vec::new(),
            open: Vec::new(),
        };

        while pc < end {
            match &instrs[pc] {
                Instr::CreateElement { tag, key } => {
                    out.open.push(Element::new(tag, key.clone()));
                }

                Instr::SetAttribute { name, value } => {
                    out.element().attrs.push((name.clone(), Some(value.clone())));
                }

                Instr::SetFlag { name } => {
                    out.element().attrs.push((name.clone(), None));
                }

                Instr::SetAttributeExpr { name, action, .. } => {
                    let value = self.attribute(pc, scope);
                    let el = out.element();
                    el.set_attr(name, value);
                    el.bindings.push(AttrBinding {
                        action: *action,
                        pc,
                        scope: scope.clone(),
                    });
                }

                Instr::AddListener { event, handler } => {
                    let handler = self.listener(handler, scope);
                    out.element().events.push(EventBinding {
                        event: event.clone(),
                        handler,
                    });
                }

                Instr::AppendChild => {
                    let el = out.open.pop().expect("append without open element");
                    out.push(Node::Element(el));
                }

                Instr::CreateText(text) => out.push(Node::Html(text.clone())),

                Instr::EmitExpr { .. } => {
                    let block = self.block(pc, scope);
                    out.push(Node::Block(block));
                }

                Instr::OpenConditional { end: j, .. } | Instr::OpenLoop { end: j, .. } => {
                    let block = self.block(pc, scope);
                    out.push(Node::Block(block));
                    pc = *j + 1;
                    continue;
                }

                Instr::Branch {
                    cond,
                    negate,
                    target,
                } => match self.eval(cond, scope) {
                    Ok(v) if v.is_truthy() != *negate => {}
                    Ok(_) => {
                        pc = *target;
                        continue;
                    }
                    Err(err) => {
                        let action = *self
                            .conditionals
                            .last()
                            .expect("branch outside of conditional");
                        self.diagnose(action, cond, err);
                        break;
                    }
                },

                Instr::Jump(j) => {
                    pc = *j;
                    continue;
                }

                Instr::Iterate(j) => {
                    let binding = match &instrs[pc - 1] {
                        Instr::OpenLoop { binding, .. } => binding,
                        _ => panic!("iterate must follow an open loop instr"),
                    };
                    let state = self.loops.last_mut().expect("iterate outside of loop");
                    if !state.iterate(binding, scope) {
                        pc = *j;
                        continue;
                    }
                }

                Instr::CloseConditional | Instr::CloseLoop => {
                    panic!("region end reached outside of its block")
                }
            }
            pc += 1;
        }

        // Anything still open is closed implicitly.
        while let Some(el) = out.open.pop() {
            out.push(Node::Element(el));
        }
        out.nodes
    }

    /// Renders the block whose region starts at `pc`.
    pub fn block(&mut self, pc: usize, scope: &mut Scope) -> Block {
        let template = self.template;
        let instrs = &template.program.instrs;
        let captured = scope.clone();
        let (action, end, children) = match &instrs[pc] {
            Instr::OpenConditional { action, end } => {
                self.conditionals.push(*action);
                let children = self.run(pc + 1, *end, scope);
                self.conditionals.pop();
                (*action, *end, children)
            }

            Instr::OpenLoop {
                action,
                collection,
                end,
                ..
            } => {
                let state = match self
                    .eval(collection, scope)
                    .and_then(|v| LoopState::new(&template.source, v, collection.span, scope))
                {
                    Ok(state) => state,
                    Err(err) => {
                        self.diagnose(*action, collection, err);
                        LoopState::empty(scope)
                    }
                };
                let base = state.base();
                self.loops.push(state);
                let children = self.run(pc + 1, *end, scope);
                self.loops.pop();
                scope.truncate(base);
                (*action, *end, children)
            }

            Instr::EmitExpr { expr, mode, action } => {
                let children = match self.emit(expr, *mode, scope) {
                    Ok(node) => vec![node],
                    Err(err) => {
                        self.diagnose(*action, expr, err);
                        Vec::new()
                    }
                };
                (*action, pc, children)
            }

            _ => panic!("not a block instr"),
        };
        tracing::trace!(action = %action, pc, "rendered block");
        Block {
            action,
            children,
            range: (pc, end),
            scope: captured,
        }
    }

    fn emit(&mut self, expr: &Expr, mode: EmitMode, scope: &Scope) -> Result<Node> {
        let template = self.template;
        let source = &template.source;
        let v = self.eval(expr, scope)?;
        match mode {
            EmitMode::Text | EmitMode::Html => {
                let text = v.to_text().ok_or_else(|| {
                    Error::eval(
                        format!("cannot render {} as text", v.human()),
                        source,
                        expr.span,
                    )
                })?;
                Ok(match mode {
                    EmitMode::Html => Node::Html(text.into_owned()),
                    _ => Node::Text(text.into_owned()),
                })
            }
            EmitMode::Json => {
                let json =
                    value::to_json_pretty(&v).map_err(|err| err.enrich(source, expr.span))?;
                let mut pre = Element::new("pre", None);
                pre.children.push(Node::Text(json));
                Ok(Node::Element(pre))
            }
        }
    }

    /// Evaluates the dynamic attribute at `pc`.
    ///
    /// Returns `None` if the attribute should be omitted and `Some(None)` for
    /// a boolean attribute.
    pub fn attribute(&mut self, pc: usize, scope: &Scope) -> Option<Option<String>> {
        let template = self.template;
        let (expr, action) = match &template.program.instrs[pc] {
            Instr::SetAttributeExpr { expr, action, .. } => (expr, *action),
            _ => panic!("not an attribute instr"),
        };
        match self.eval(expr, scope) {
            Ok(Value::None | Value::Bool(false)) => None,
            Ok(Value::Bool(true)) => Some(None),
            Ok(v) => Some(Some(v.to_js_string().into_owned())),
            Err(err) => {
                self.diagnose(action, expr, err);
                None
            }
        }
    }

    /// Decides how an event handler is written into the markup.
    fn listener(&mut self, handler: &Rc<HandlerSource>, scope: &Scope) -> Handler {
        if handler.locals.is_empty() {
            return Handler::Inline(handler.expr.to_string());
        }

        let mut locals = BTreeMap::new();
        let mut only_indices = true;
        for name in &handler.locals {
            match scope.lookup(name) {
                Some(var) => {
                    only_indices &= var.is_index;
                    locals.insert(name.clone(), var.value.clone());
                }
                None => {
                    only_indices = false;
                    locals.insert(name.clone(), Value::None);
                }
            }
        }

        if only_indices {
            let expr = rewrite::substitute(&handler.expr, &locals);
            return Handler::Inline(expr.to_string());
        }

        let token = self.ctx.handlers.register_persistent(CapturedHandler {
            source: handler.clone(),
            locals,
        });
        Handler::Token(token)
    }

    /// Re-runs the outermost blocks and the attributes whose action is in
    /// `actions`, returns the actions that ran.
    pub fn update(&mut self, nodes: &mut [Node], actions: &BTreeSet<ActionId>) -> Vec<ActionId> {
        let mut ran = Vec::new();
        self.update_nodes(nodes, actions, &mut ran);
        ran.sort();
        ran.dedup();
        ran
    }

    fn update_nodes(
        &mut self,
        nodes: &mut [Node],
        actions: &BTreeSet<ActionId>,
        ran: &mut Vec<ActionId>,
    ) {
        let template = self.template;
        for node in nodes {
            match node {
                Node::Block(block) if actions.contains(&block.action) => {
                    tracing::trace!(action = %block.action, "re-running block");
                    self.release(&block.children);
                    let mut scope = block.scope.clone();
                    *block = self.block(block.range.0, &mut scope);
                    ran.push(block.action);
                }
                Node::Block(block) => self.update_nodes(&mut block.children, actions, ran),
                Node::Element(el) => {
                    let bindings = mem::take(&mut el.bindings);
                    for binding in &bindings {
                        if actions.contains(&binding.action) {
                            tracing::trace!(action = %binding.action, "re-running attribute");
                            let value = self.attribute(binding.pc, &binding.scope);
                            let name = match &template.program.instrs[binding.pc] {
                                Instr::SetAttributeExpr { name, .. } => name,
                                _ => panic!("not an attribute instr"),
                            };
                            el.set_attr(name, value);
                            ran.push(binding.action);
                        }
                    }
                    el.bindings = bindings;
                    self.update_nodes(&mut el.children, actions, ran);
                }
                Node::Text(_) | Node::Html(_) => {}
            }
        }
    }

    /// Releases the handler tokens of a subtree that is being replaced.
    fn release(&mut self, nodes: &[Node]) {
        crate::dom::walk(nodes, &mut |node| {
            if let Node::Element(el) = node {
                for binding in &el.events {
                    if let Handler::Token(token) = &binding.handler {
                        self.ctx.handlers.release(*token);
                    }
                }
            }
        });
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value> {
        let ctx = &mut *self.ctx;
        Env {
            source: &self.template.source,
            functions: &self.template.functions,
            state: &mut ctx.state,
            props: &ctx.props,
            methods: &ctx.methods,
            scope,
        }
        .eval(expr)
    }

    /// Records a recovered evaluation error.
    fn diagnose(&mut self, action: ActionId, expr: &Expr, error: Error) {
        let code = expr.to_string();
        tracing::warn!(
            action = %action,
            code = %code,
            template = self.template.name.as_deref().unwrap_or("anonymous"),
            "{}",
            error.msg()
        );
        self.ctx.diagnostics.push(Diagnostic {
            action,
            code,
            error: error.with_template_name(self.template.name.as_deref()),
        });
    }
}

impl Output {
    fn element(&mut self) -> &mut Element {
        self.open
            .last_mut()
            .expect("attribute instr outside of element")
    }

    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.nodes.push(node),
        }
    }
}
