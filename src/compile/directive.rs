//! Classifies the inside of a braced token.

use crate::compile::expr::lex::{Lexer, Token};
use crate::compile::scan;
use crate::types::ast::LoopBinding;
use crate::types::span::Span;
use crate::{Error, Result};

/// The name of the implicit index of a single parameter loop binding.
pub const IMPLICIT_INDEX: &str = "index";

/// A braced token, either a block directive or a plain expression.
///
/// Spans point at the expressions within the directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `{#if cond}`
    If(Span),
    /// `{#unless cond}`
    Unless(Span),
    /// `{:else if cond}`
    ElseIf(Span),
    /// `{:else}`
    Else,
    /// `{#each collection as binding}`
    Each {
        collection: Span,
        binding: LoopBinding,
    },
    /// `{#for binding in collection}`
    For {
        binding: LoopBinding,
        collection: Span,
    },
    /// `{/if}`
    IfEnd,
    /// `{/unless}`
    UnlessEnd,
    /// `{/each}`
    EachEnd,
    /// `{/for}`
    ForEnd,
    /// `{@html expr}`
    Html(Span),
    /// `{@json expr}`
    Json(Span),
    /// `{expr}`
    Expr(Span),
}

impl Directive {
    /// A human readable name for error messages.
    pub fn human(&self) -> &'static str {
        match self {
            Self::If(_) => "`{#if}`",
            Self::Unless(_) => "`{#unless}`",
            Self::ElseIf(_) => "`{:else if}`",
            Self::Else => "`{:else}`",
            Self::Each { .. } => "`{#each}`",
            Self::For { .. } => "`{#for}`",
            Self::IfEnd => "`{/if}`",
            Self::UnlessEnd => "`{/unless}`",
            Self::EachEnd => "`{/each}`",
            Self::ForEnd => "`{/for}`",
            Self::Html(_) => "`{@html}`",
            Self::Json(_) => "`{@json}`",
            Self::Expr(_) => "expression",
        }
    }
}

/// Parse the braced token whose inside is at `span`.
pub fn parse(source: &str, span: Span) -> Result<Directive> {
    let span = trim(source, span);
    let s = &source[span];

    let sigil = match s.as_bytes().first() {
        Some(c @ (b'#' | b':' | b'/' | b'@')) => *c,
        _ => return Ok(Directive::Expr(span)),
    };

    let kw_end = s[1..]
        .find(char::is_whitespace)
        .map_or(span.n, |i| span.m + 1 + i);
    let keyword = &source[span.m + 1..kw_end];
    let rest = trim(source, Span::from(kw_end..span.n));

    let expect_expr = |rest: Span| {
        if rest.is_empty() {
            Err(Error::syntax(
                format!("expected expression after `{}`", &source[span.m..kw_end]),
                source,
                span,
            ))
        } else {
            Ok(rest)
        }
    };

    let expect_end = |directive: Directive| {
        if rest.is_empty() {
            Ok(directive)
        } else {
            Err(Error::syntax(
                format!("unexpected text after {}", directive.human()),
                source,
                rest,
            ))
        }
    };

    match (sigil, keyword) {
        (b'#', "if") => Ok(Directive::If(expect_expr(rest)?)),
        (b'#', "unless") => Ok(Directive::Unless(expect_expr(rest)?)),
        (b'#', "each") => {
            let rest = expect_expr(rest)?;
            let kw = find_keyword(source, rest, "as", true).ok_or_else(|| {
                Error::syntax("expected `as` in `{#each}` directive", source, rest)
            })?;
            let collection = trim(source, Span::from(rest.m..kw.m));
            let binding = parse_binding(source, trim(source, Span::from(kw.n..rest.n)))?;
            Ok(Directive::Each {
                collection,
                binding,
            })
        }
        (b'#', "for") => {
            let rest = expect_expr(rest)?;
            let kw = find_keyword(source, rest, "in", false).ok_or_else(|| {
                Error::syntax("expected `in` in `{#for}` directive", source, rest)
            })?;
            let binding = parse_binding(source, trim(source, Span::from(rest.m..kw.m)))?;
            let collection = expect_expr(trim(source, Span::from(kw.n..rest.n)))?;
            Ok(Directive::For {
                binding,
                collection,
            })
        }
        (b':', "else") => {
            let r = &source[rest];
            if rest.is_empty() {
                Ok(Directive::Else)
            } else if r == "if" || r.starts_with("if ") || r.starts_with("if\t") {
                let cond = trim(source, Span::from(rest.m + 2..rest.n));
                Ok(Directive::ElseIf(expect_expr(cond)?))
            } else {
                Err(Error::syntax(
                    "unexpected text after `{:else}`",
                    source,
                    rest,
                ))
            }
        }
        (b'/', "if") => expect_end(Directive::IfEnd),
        (b'/', "unless") => expect_end(Directive::UnlessEnd),
        (b'/', "each") => expect_end(Directive::EachEnd),
        (b'/', "for") => expect_end(Directive::ForEnd),
        (b'@', "html") => Ok(Directive::Html(expect_expr(rest)?)),
        (b'@', "json") => Ok(Directive::Json(expect_expr(rest)?)),
        _ => Err(Error::syntax(
            format!("unknown directive `{}`", &source[span.m..kw_end]),
            source,
            Span::from(span.m..kw_end),
        )),
    }
}

/// Parses loop variables, e.g. `todo`, `todo, i` or `(key, value)`.
pub fn parse_binding(source: &str, span: Span) -> Result<LoopBinding> {
    let tokens = Lexer::new(source, span).tokenize()?;

    let (inner, is_destructured) = match (tokens.first(), tokens.last()) {
        (Some((Token::OpenParen, _)), Some((Token::CloseParen, _)))
        | (Some((Token::OpenBracket, _)), Some((Token::CloseBracket, _)))
            if tokens.len() >= 2 =>
        {
            (&tokens[1..tokens.len() - 1], true)
        }
        _ => (&tokens[..], false),
    };

    let mut params = Vec::new();
    for (i, (tk, s)) in inner.iter().enumerate() {
        match tk {
            Token::Ident if i % 2 == 0 => params.push(source[*s].to_owned()),
            Token::Comma if i % 2 == 1 => {}
            tk => {
                let exp = if i % 2 == 0 { "loop variable" } else { "comma" };
                return Err(Error::syntax(
                    format!("expected {exp}, found {}", tk.human()),
                    source,
                    *s,
                ));
            }
        }
    }
    if params.is_empty() || inner.len() % 2 == 0 {
        return Err(Error::syntax("expected loop variable", source, span));
    }

    let index_param = (!is_destructured && params.len() == 1).then(|| IMPLICIT_INDEX.to_owned());
    Ok(LoopBinding {
        params,
        index_param,
        is_destructured,
    })
}

/// Finds a keyword surrounded by whitespace outside of any brackets or
/// strings.
fn find_keyword(source: &str, span: Span, kw: &str, last: bool) -> Option<Span> {
    let bytes = &source.as_bytes()[..span.n];
    let mut depth = 0i32;
    let mut found = None;
    let mut i = span.m;
    while i < span.n {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            q @ (b'"' | b'\'' | b'`') => match scan::quoted(bytes, i, q, true) {
                Ok(j) => {
                    i = j;
                    continue;
                }
                Err(_) => return found,
            },
            _ if depth == 0 && bytes[i..].starts_with(kw.as_bytes()) => {
                let j = i + kw.len();
                let before = i > span.m && bytes[i - 1].is_ascii_whitespace();
                let after = j < span.n && bytes[j].is_ascii_whitespace();
                if before && after {
                    found = Some(Span::from(i..j));
                    if !last {
                        return found;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    found
}

fn trim(source: &str, span: Span) -> Span {
    let s = &source[span];
    let m = span.m + (s.len() - s.trim_start().len());
    let n = span.n - (s.len() - s.trim_end().len());
    Span::from(m..n.max(m))
}
