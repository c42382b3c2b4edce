//! The embedded expression language, a small subset of JavaScript
//! expressions.

pub mod lex;
mod parse;

use crate::types::ast::Expr;
use crate::types::span::Span;
use crate::Result;

pub use crate::compile::expr::parse::Parser;

/// Parse the expression at `span` in the template source.
pub fn parse(source: &str, span: Span) -> Result<Expr> {
    Parser::new(source, span)?.parse_all()
}
