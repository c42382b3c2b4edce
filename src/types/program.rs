//! Defines a compiled [`Program`] which is a sequence of [`Instr`] that can
//! be executed by the renderer.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::types::ast::{Expr, LoopBinding};
use crate::types::span::Span;

pub const FIXME: usize = !0;

/// Identifies one re-runnable region of a program, or one dynamic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub(crate) usize);

impl ActionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The instructions and render actions of a compiled template.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instrs: Vec<Instr>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    /// The location of the governing expression.
    pub span: Span,
    /// The top-level state fields the governing expression reads.
    pub fields: BTreeSet<String>,
    /// Whether the governing expression reads the whole state.
    pub any: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Conditional,
    Loop,
    Attribute,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Escaped text.
    Text,
    /// Trusted markup.
    Html,
    /// Pretty printed JSON inside a `<pre>` element.
    Json,
}

/// A rewritten event handler and the loop variables it reads.
#[derive(Debug, Clone)]
pub struct HandlerSource {
    pub expr: Expr,
    pub locals: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Instr {
    /// Start a new element and make it the current parent
    CreateElement { tag: String, key: Option<String> },

    /// Set a static attribute on the current element
    SetAttribute { name: String, value: String },

    /// Set a boolean attribute on the current element
    SetFlag { name: String },

    /// Evaluate and set an attribute on the current element
    SetAttributeExpr {
        name: String,
        expr: Expr,
        action: ActionId,
    },

    /// Bind an event handler on the current element
    AddListener {
        event: String,
        handler: Rc<HandlerSource>,
    },

    /// Finish the current element and append it to its parent
    AppendChild,

    /// Append literal template markup
    CreateText(String),

    /// Evaluate and append an expression
    EmitExpr {
        expr: Expr,
        mode: EmitMode,
        action: ActionId,
    },

    /// Start the region of a conditional chain which ends at the given
    /// instruction
    OpenConditional { action: ActionId, end: usize },

    /// Evaluate the condition and jump to the instruction if it does not hold
    Branch {
        cond: Expr,
        negate: bool,
        target: usize,
    },

    /// Jump to an instruction
    Jump(usize),

    /// End the region of a conditional chain
    CloseConditional,

    /// Evaluate the collection and start a loop over it, the region ends at
    /// the given instruction
    OpenLoop {
        action: ActionId,
        binding: LoopBinding,
        collection: Expr,
        end: usize,
    },

    /// Advance the current loop or jump to the instruction when it is done
    Iterate(usize),

    /// End the region of a loop
    CloseLoop,
}

impl Program {
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.0]
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.instrs.len().saturating_sub(1).to_string().len();
        for (pc, instr) in self.instrs.iter().enumerate() {
            write!(f, "{pc:>width$}  ")?;
            match instr {
                Instr::CreateElement { tag, key: None } => writeln!(f, "create_element <{tag}>"),
                Instr::CreateElement {
                    tag,
                    key: Some(key),
                } => writeln!(f, "create_element <{tag}> key={key:?}"),
                Instr::SetAttribute { name, value } => {
                    writeln!(f, "set_attribute {name}={value:?}")
                }
                Instr::SetFlag { name } => writeln!(f, "set_flag {name}"),
                Instr::SetAttributeExpr { name, expr, action } => {
                    writeln!(f, "set_attribute {name}={{{expr}}} {action}")
                }
                Instr::AddListener { event, handler } => {
                    writeln!(f, "add_listener {event} {{{}}}", handler.expr)
                }
                Instr::AppendChild => writeln!(f, "append_child"),
                Instr::CreateText(text) => writeln!(f, "create_text {text:?}"),
                Instr::EmitExpr { expr, mode, action } => {
                    let op = match mode {
                        EmitMode::Text => "emit_text",
                        EmitMode::Html => "emit_html",
                        EmitMode::Json => "emit_json",
                    };
                    writeln!(f, "{op} {{{expr}}} {action}")
                }
                Instr::OpenConditional { action, end } => {
                    writeln!(f, "open_conditional {action} end={end}")
                }
                Instr::Branch {
                    cond,
                    negate,
                    target,
                } => {
                    let op = if *negate { "branch_if" } else { "branch_unless" };
                    writeln!(f, "{op} {{{cond}}} -> {target}")
                }
                Instr::Jump(target) => writeln!(f, "jump -> {target}"),
                Instr::CloseConditional => writeln!(f, "close_conditional"),
                Instr::OpenLoop {
                    action,
                    binding,
                    collection,
                    end,
                } => writeln!(
                    f,
                    "open_loop {binding} in {{{collection}}} {action} end={end}"
                ),
                Instr::Iterate(target) => writeln!(f, "iterate else -> {target}"),
                Instr::CloseLoop => writeln!(f, "close_loop"),
            }?;
        }
        Ok(())
    }
}
