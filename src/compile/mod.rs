//! Compile the template into a program that can be executed by the renderer.
//!
//! This process has three stages:
//! - The lexer chunks the template source into text, tag and expression
//!   tokens.
//! - Tags are parsed into elements and attributes, braced tokens into
//!   directives and rewritten expressions.
//! - The compiler tracks open elements and blocks and constructs the
//!   program, recording which state fields each render action reads.

pub mod deps;
pub mod directive;
pub mod expr;
pub mod legacy;
mod lex;
pub mod rewrite;
mod scan;
pub mod tag;

use std::rc::Rc;

use crate::compile::deps::{DependencyMap, Reads};
use crate::compile::directive::Directive;
use crate::compile::lex::{Lexer, Token};
use crate::compile::tag::{AttrValue, ParsedTag};
use crate::functions::Functions;
use crate::types::ast::{Expr, LoopBinding};
use crate::types::program::{Action, ActionId, ActionKind, EmitMode, Instr, Program, FIXME};
use crate::types::span::Span;
use crate::{Error, Result};

/// Compile a template into a program and its dependency map.
pub fn template(source: &str, functions: &Functions) -> Result<(Program, DependencyMap)> {
    let program = Compiler::new(source, functions).compile()?;
    let dependencies = DependencyMap::build(&program.actions);
    Ok((program, dependencies))
}

/// A compiler that constructs a program from the token stream.
///
/// This works using two stacks:
/// - A stack of open elements, e.g. `<ul> <li>`.
/// - A stack of open blocks, e.g. `{#each todos as todo} {#if todo.done}`.
///
/// Elements must nest inside blocks, so every block remembers how many
/// elements were open when it started.
struct Compiler<'a> {
    source: &'a str,
    functions: &'a Functions,
    instrs: Vec<Instr>,
    actions: Vec<Action>,
    elements: Vec<OpenElement>,
    blocks: Vec<Block>,

    /// The loop variables in scope, innermost last.
    loop_vars: Vec<String>,
}

struct OpenElement {
    name: String,
    span: Span,
}

/// A partial block.
struct Block {
    kind: BlockKind,
    action: ActionId,
    /// The `OpenConditional` or `OpenLoop` instruction.
    open: usize,
    /// The number of open elements when the block started.
    depth: usize,
    /// The span of the opening directive.
    span: Span,
    /// The pending `Branch` of a conditional or the `Iterate` of a loop.
    pending: Option<usize>,
    /// Jumps from the end of each branch to the end of the chain.
    exits: Vec<usize>,
    has_else: bool,
    /// The number of loop variables this block introduced.
    names: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
    Each,
    For,
}

impl BlockKind {
    fn opener(self) -> &'static str {
        match self {
            Self::If => "`{#if}`",
            Self::Unless => "`{#unless}`",
            Self::Each => "`{#each}`",
            Self::For => "`{#for}`",
        }
    }

    fn closer(self) -> &'static str {
        match self {
            Self::If => "`{/if}`",
            Self::Unless => "`{/unless}`",
            Self::Each => "`{/each}`",
            Self::For => "`{/for}`",
        }
    }
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, functions: &'a Functions) -> Self {
        Self {
            source,
            functions,
            instrs: Vec::new(),
            actions: Vec::new(),
            elements: Vec::new(),
            blocks: Vec::new(),
            loop_vars: Vec::new(),
        }
    }

    fn compile(mut self) -> Result<Program> {
        let mut lexer = Lexer::new(self.source);
        while let Some((tk, span)) = lexer.next()? {
            match tk {
                Token::Text => self.compile_text(span),
                Token::Tag if self.source[span].starts_with("<!") => {
                    self.push(Instr::CreateText(self.source[span].to_owned()));
                }
                Token::Tag => {
                    let tag = tag::parse(self.source, span)?;
                    self.compile_tag(tag)?;
                }
                Token::Expr => {
                    let directive = directive::parse(self.source, span)?;
                    self.compile_directive(directive, span)?;
                }
            }
        }

        if let Some(block) = self.blocks.last() {
            return Err(Error::block_mismatch(
                format!("unclosed {} block", block.kind.opener()),
                self.source,
                block.span,
            ));
        }
        // Elements left open at the end are closed implicitly.
        for _ in 0..self.elements.len() {
            self.push(Instr::AppendChild);
        }

        Ok(Program {
            instrs: self.instrs,
            actions: self.actions,
        })
    }

    fn compile_text(&mut self, span: Span) {
        let text = &self.source[span];
        if text.trim().is_empty() && text.contains('\n') {
            return;
        }
        self.push(Instr::CreateText(text.to_owned()));
    }

    fn compile_tag(&mut self, tag: ParsedTag) -> Result<()> {
        if tag.is_closing {
            return self.close_element(tag);
        }

        let key = if tag.name == "slot" {
            let name = tag.attributes.iter().find_map(|a| match &a.value {
                AttrValue::Static(v) if a.name == "name" => Some(v.as_str()),
                _ => None,
            });
            Some(format!("slot:{}", name.unwrap_or("default")))
        } else {
            tag.attributes.iter().find_map(|a| match &a.value {
                AttrValue::Static(v) if a.name == "key" => Some(v.clone()),
                _ => None,
            })
        };

        self.push(Instr::CreateElement {
            tag: tag.name.clone(),
            key,
        });

        let closes = tag.is_self_closing || tag.is_void();
        for attr in tag.attributes {
            let event = attr.event().map(ToOwned::to_owned);
            match attr.value {
                AttrValue::Static(value) => {
                    self.push(Instr::SetAttribute {
                        name: attr.name,
                        value,
                    });
                }
                AttrValue::Boolean => {
                    self.push(Instr::SetFlag { name: attr.name });
                }
                AttrValue::Dynamic(span) => match event {
                    Some(event) => {
                        let handler = rewrite::parse_handler(
                            self.source,
                            span,
                            self.functions,
                            &self.loop_vars,
                        )?;
                        self.push(Instr::AddListener {
                            event,
                            handler: Rc::new(handler),
                        });
                    }
                    None => {
                        let expr = self.parse_expr(span)?;
                        let action = self.new_action(ActionKind::Attribute, span, &expr);
                        self.push(Instr::SetAttributeExpr {
                            name: attr.name,
                            expr,
                            action,
                        });
                    }
                },
            }
        }

        if closes {
            self.push(Instr::AppendChild);
        } else {
            self.elements.push(OpenElement {
                name: tag.name,
                span: tag.span,
            });
        }
        Ok(())
    }

    fn close_element(&mut self, tag: ParsedTag) -> Result<()> {
        let depth = self.blocks.last().map_or(0, |b| b.depth);
        match self.elements.last() {
            Some(open) if self.elements.len() > depth && open.name == tag.name => {
                self.elements.pop();
                self.push(Instr::AppendChild);
                Ok(())
            }
            Some(open) if self.elements.len() > depth => Err(Error::block_mismatch(
                format!("expected `</{}>`, found `</{}>`", open.name, tag.name),
                self.source,
                tag.span,
            )),
            _ => Err(Error::block_mismatch(
                format!("unexpected closing tag `</{}>`", tag.name),
                self.source,
                tag.span,
            )),
        }
    }

    fn compile_directive(&mut self, directive: Directive, span: Span) -> Result<()> {
        match directive {
            Directive::If(cond) => self.open_conditional(BlockKind::If, cond, span),
            Directive::Unless(cond) => self.open_conditional(BlockKind::Unless, cond, span),

            Directive::ElseIf(cond) => {
                let block = self.else_block(&directive, span)?;
                let (action, pending) = (block.action, block.pending);
                let expr = self.parse_expr(cond)?;
                self.add_reads(action, &expr);

                let j = self.push(Instr::Jump(FIXME));
                if let Some(b) = pending {
                    self.update_jump(b);
                }
                let b = self.push(Instr::Branch {
                    cond: expr,
                    negate: false,
                    target: FIXME,
                });
                let block = self.blocks.last_mut().expect("checked by else_block");
                block.exits.push(j);
                block.pending = Some(b);
                Ok(())
            }

            Directive::Else => {
                let block = self.else_block(&directive, span)?;
                let pending = block.pending;
                let j = self.push(Instr::Jump(FIXME));
                if let Some(b) = pending {
                    self.update_jump(b);
                }
                let block = self.blocks.last_mut().expect("checked by else_block");
                block.exits.push(j);
                block.pending = None;
                block.has_else = true;
                Ok(())
            }

            Directive::IfEnd => self.close_conditional(BlockKind::If, &directive, span),
            Directive::UnlessEnd => self.close_conditional(BlockKind::Unless, &directive, span),

            Directive::Each {
                collection,
                binding,
            } => self.open_loop(BlockKind::Each, collection, binding, span),
            Directive::For {
                binding,
                collection,
            } => self.open_loop(BlockKind::For, collection, binding, span),

            Directive::EachEnd => self.close_loop(BlockKind::Each, &directive, span),
            Directive::ForEnd => self.close_loop(BlockKind::For, &directive, span),

            Directive::Html(e) => self.emit_expr(e, EmitMode::Html),
            Directive::Json(e) => self.emit_expr(e, EmitMode::Json),
            Directive::Expr(e) => self.emit_expr(e, EmitMode::Text),
        }
    }

    fn emit_expr(&mut self, span: Span, mode: EmitMode) -> Result<()> {
        let expr = self.parse_expr(span)?;
        let action = self.new_action(ActionKind::Text, span, &expr);
        self.push(Instr::EmitExpr { expr, mode, action });
        Ok(())
    }

    fn open_conditional(&mut self, kind: BlockKind, cond: Span, span: Span) -> Result<()> {
        let expr = self.parse_expr(cond)?;
        let action = self.new_action(ActionKind::Conditional, cond, &expr);
        let open = self.push(Instr::OpenConditional { action, end: FIXME });
        let b = self.push(Instr::Branch {
            cond: expr,
            negate: kind == BlockKind::Unless,
            target: FIXME,
        });
        self.blocks.push(Block {
            kind,
            action,
            open,
            depth: self.elements.len(),
            span,
            pending: Some(b),
            exits: Vec::new(),
            has_else: false,
            names: 0,
        });
        Ok(())
    }

    /// Checks that an `else` clause is allowed here and returns the block.
    fn else_block(&self, directive: &Directive, span: Span) -> Result<&Block> {
        let err = || {
            Error::block_mismatch(
                format!("unexpected {}", directive.human()),
                self.source,
                span,
            )
        };
        let block = self.blocks.last().ok_or_else(err)?;
        match block.kind {
            BlockKind::If | BlockKind::Unless if !block.has_else => {
                self.check_elements_closed(block)?;
                Ok(block)
            }
            _ => Err(err()),
        }
    }

    fn close_conditional(&mut self, kind: BlockKind, directive: &Directive, span: Span) -> Result<()> {
        let block = self.pop_block(kind, directive, span)?;
        if let Some(b) = block.pending {
            self.update_jump(b);
        }
        for j in &block.exits {
            self.update_jump(*j);
        }
        let end = self.push(Instr::CloseConditional);
        match &mut self.instrs[block.open] {
            Instr::OpenConditional { end: e, .. } => *e = end,
            _ => panic!("not an open conditional instr"),
        }
        Ok(())
    }

    fn open_loop(
        &mut self,
        kind: BlockKind,
        collection: Span,
        binding: LoopBinding,
        span: Span,
    ) -> Result<()> {
        let expr = self.parse_expr(collection)?;
        let action = self.new_action(ActionKind::Loop, collection, &expr);
        let names: Vec<String> = binding.names().map(ToOwned::to_owned).collect();
        let open = self.push(Instr::OpenLoop {
            action,
            binding,
            collection: expr,
            end: FIXME,
        });
        let j = self.push(Instr::Iterate(FIXME));
        self.blocks.push(Block {
            kind,
            action,
            open,
            depth: self.elements.len(),
            span,
            pending: Some(j),
            exits: Vec::new(),
            has_else: false,
            names: names.len(),
        });
        self.loop_vars.extend(names);
        Ok(())
    }

    fn close_loop(&mut self, kind: BlockKind, directive: &Directive, span: Span) -> Result<()> {
        let block = self.pop_block(kind, directive, span)?;
        let j = block.pending.expect("loop blocks always have an iterate instr");
        self.push(Instr::Jump(j));
        self.update_jump(j);
        let end = self.push(Instr::CloseLoop);
        match &mut self.instrs[block.open] {
            Instr::OpenLoop { end: e, .. } => *e = end,
            _ => panic!("not an open loop instr"),
        }
        let n = self.loop_vars.len() - block.names;
        self.loop_vars.truncate(n);
        Ok(())
    }

    /// Pops the innermost block checking that it is the expected kind and
    /// that no element opened inside it is still open.
    fn pop_block(&mut self, kind: BlockKind, directive: &Directive, span: Span) -> Result<Block> {
        let block = match self.blocks.last() {
            Some(block) if block.kind == kind => block,
            Some(block) => {
                return Err(Error::block_mismatch(
                    format!(
                        "expected {}, found {}",
                        block.kind.closer(),
                        directive.human()
                    ),
                    self.source,
                    span,
                ))
            }
            None => {
                return Err(Error::block_mismatch(
                    format!("unexpected {}, no block is open", directive.human()),
                    self.source,
                    span,
                ))
            }
        };
        self.check_elements_closed(block)?;
        Ok(self.blocks.pop().expect("checked above"))
    }

    fn check_elements_closed(&self, block: &Block) -> Result<()> {
        match self.elements.get(block.depth) {
            Some(open) => Err(Error::block_mismatch(
                format!(
                    "unclosed element `<{}>` inside {} block",
                    open.name,
                    block.kind.opener()
                ),
                self.source,
                open.span,
            )),
            None => Ok(()),
        }
    }

    fn parse_expr(&self, span: Span) -> Result<Expr> {
        rewrite::parse(self.source, span, self.functions, &self.loop_vars)
    }

    fn new_action(&mut self, kind: ActionKind, span: Span, expr: &Expr) -> ActionId {
        let reads = Reads::of(expr);
        let id = ActionId(self.actions.len());
        self.actions.push(Action {
            kind,
            span,
            fields: reads.fields,
            any: reads.any,
        });
        id
    }

    /// Adds the reads of another expression to an existing action, used for
    /// `else if` conditions.
    fn add_reads(&mut self, id: ActionId, expr: &Expr) {
        let reads = Reads::of(expr);
        let action = &mut self.actions[id.0];
        action.fields.extend(reads.fields);
        action.any |= reads.any;
    }

    fn update_jump(&mut self, i: usize) {
        let n = self.instrs.len();
        let j = match &mut self.instrs[i] {
            Instr::Jump(j) | Instr::Iterate(j) | Instr::Branch { target: j, .. } => j,
            _ => panic!("not a jump instr"),
        };
        *j = n;
    }

    fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }
}
