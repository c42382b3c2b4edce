use std::fmt::Display;

use crate::compile::expr::lex::{Lexer, Token};
use crate::compile::scan;
use crate::types::ast::{BinaryOp, Expr, ExprKind, TemplatePart, UnaryOp};
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A parser that constructs an expression AST from a token stream.
///
/// The whole expression is tokenized up front so that the parser can look
/// ahead arbitrarily far, which it needs to tell an arrow function's
/// parameter list apart from a parenthesized expression.
pub struct Parser<'source> {
    source: &'source str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    span: Span,
}

impl<'source> Parser<'source> {
    /// Construct a new parser for the expression at `span`.
    pub fn new(source: &'source str, span: Span) -> Result<Self> {
        let tokens = Lexer::new(source, span).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            span,
        })
    }

    /// Parses the entire region as a single expression.
    pub fn parse_all(mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        match self.peek() {
            None => Ok(expr),
            Some((tk, span)) => Err(self.err_unexpected_token("end of expression", tk, span)),
        }
    }

    /// Parses an expression.
    ///
    ///   todo.done ? 'done' : ''
    ///
    ///   (e) => select(e, todo)
    ///
    pub fn parse_expr(&mut self) -> Result<Expr> {
        if let Some(params) = self.arrow_params() {
            return self.parse_arrow(params);
        }
        self.parse_conditional()
    }

    /// Returns the parameter names if the upcoming tokens start an arrow
    /// function, without consuming anything.
    fn arrow_params(&self) -> Option<Vec<(String, Span)>> {
        let tokens = &self.tokens[self.pos..];
        match tokens {
            [(Token::Ident, span), (Token::Arrow, _), ..] => {
                Some(vec![(self.source[*span].to_owned(), *span)])
            }
            [(Token::OpenParen, _), rest @ ..] => {
                let mut params = Vec::new();
                let mut iter = rest.iter();
                loop {
                    match iter.next()? {
                        (Token::CloseParen, _) if params.is_empty() => break,
                        (Token::Ident, span) => {
                            params.push((self.source[*span].to_owned(), *span));
                            match iter.next()? {
                                (Token::Comma, _) => continue,
                                (Token::CloseParen, _) => break,
                                _ => return None,
                            }
                        }
                        _ => return None,
                    }
                }
                match iter.next()? {
                    (Token::Arrow, _) => Some(params),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn parse_arrow(&mut self, params: Vec<(String, Span)>) -> Result<Expr> {
        let start = self.tokens[self.pos].1;
        // Skip the parameter list, it was already collected.
        while let Some((tk, _)) = self.next() {
            if tk == Token::Arrow {
                break;
            }
        }
        if let Some((Token::OpenBrace, span)) = self.peek() {
            return Err(Error::syntax(
                "arrow function bodies must be an expression, wrap object literals in parentheses",
                self.source,
                span,
            ));
        }
        let body = self.parse_expr()?;
        let span = start.combine(body.span);
        let params = params.into_iter().map(|(name, _)| name).collect();
        Ok(Expr::new(
            ExprKind::Arrow {
                params,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let cond = self.parse_binary(1)?;
        if self.eat(Token::Question).is_none() {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_expr()?;
        let span = cond.span.combine(otherwise.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    /// Parses a chain of binary operators with at least the given
    /// precedence.
    fn parse_binary(&mut self, min: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek().and_then(|(tk, _)| binary_op(tk)) {
            let prec = op.precedence();
            if prec < min {
                break;
            }
            self.next();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.combine(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some((Token::Bang, span)) => Some((UnaryOp::Not, span)),
            Some((Token::Minus, span)) => Some((UnaryOp::Neg, span)),
            Some((Token::Plus, span)) => Some((UnaryOp::Plus, span)),
            Some((Token::Ident, span)) if &self.source[span] == "typeof" => {
                Some((UnaryOp::TypeOf, span))
            }
            _ => None,
        };
        match op {
            Some((op, span)) => {
                self.next();
                let operand = self.parse_unary()?;
                let span = span.combine(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            None => self.parse_postfix(),
        }
    }

    /// Parses member access, index access and calls.
    ///
    ///   todos[0]?.text.toUpperCase()
    ///
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            expr = match self.peek() {
                Some((Token::Dot, _)) => {
                    self.next();
                    let (property, span) = self.parse_property()?;
                    member(expr, property, span, false)
                }
                Some((Token::QuestionDot, _)) => {
                    self.next();
                    match self.peek() {
                        Some((Token::OpenBracket, _)) => self.parse_index(expr, true)?,
                        Some((Token::OpenParen, _)) => self.parse_call(expr)?,
                        _ => {
                            let (property, span) = self.parse_property()?;
                            member(expr, property, span, true)
                        }
                    }
                }
                Some((Token::OpenBracket, _)) => self.parse_index(expr, false)?,
                Some((Token::OpenParen, _)) => self.parse_call(expr)?,
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_property(&mut self) -> Result<(String, Span)> {
        let span = self.expect(Token::Ident)?;
        Ok((self.source[span].to_owned(), span))
    }

    fn parse_index(&mut self, object: Expr, optional: bool) -> Result<Expr> {
        self.expect(Token::OpenBracket)?;
        let index = self.parse_expr()?;
        let end = self.expect(Token::CloseBracket)?;
        let span = object.span.combine(end);
        Ok(Expr::new(
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
                optional,
            },
            span,
        ))
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr> {
        self.expect(Token::OpenParen)?;
        let (args, end) = self.parse_list(Token::CloseParen)?;
        let span = callee.span.combine(end);
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    /// Parses comma separated expressions up to and including the closing
    /// token. A trailing comma is allowed.
    fn parse_list(&mut self, close: Token) -> Result<(Vec<Expr>, Span)> {
        let mut items = Vec::new();
        loop {
            if let Some(span) = self.eat(close) {
                return Ok((items, span));
            }
            items.push(self.parse_expr()?);
            if self.eat(Token::Comma).is_none() {
                let span = self.expect(close)?;
                return Ok((items, span));
            }
        }
    }

    /// Parses a literal, identifier, or a parenthesized, array or object
    /// expression.
    fn parse_primary(&mut self) -> Result<Expr> {
        let (tk, span) = self.parse()?;
        let kind = match tk {
            Token::Number => ExprKind::Literal(self.parse_number(span)?),
            Token::String => ExprKind::Literal(Value::String(self.parse_string(span)?)),
            Token::Template => self.parse_template(span)?,
            Token::Ident => match &self.source[span] {
                "true" => ExprKind::Literal(Value::Bool(true)),
                "false" => ExprKind::Literal(Value::Bool(false)),
                "null" | "undefined" => ExprKind::Literal(Value::None),
                "NaN" => ExprKind::Literal(Value::Float(f64::NAN)),
                "Infinity" => ExprKind::Literal(Value::Float(f64::INFINITY)),
                "this" => ExprKind::This,
                name => ExprKind::Ident(name.to_owned()),
            },
            Token::OpenParen => {
                let mut expr = self.parse_expr()?;
                let end = self.expect(Token::CloseParen)?;
                expr.span = span.combine(end);
                return Ok(expr);
            }
            Token::OpenBracket => {
                let (items, end) = self.parse_list(Token::CloseBracket)?;
                return Ok(Expr::new(ExprKind::Array(items), span.combine(end)));
            }
            Token::OpenBrace => return self.parse_object(span),
            tk => return Err(self.err_unexpected_token("expression", tk, span)),
        };
        Ok(Expr::new(kind, span))
    }

    /// Parses an object literal after the opening brace.
    ///
    ///   { id: todo.id, 'text': todo.text, done }
    ///
    fn parse_object(&mut self, open: Span) -> Result<Expr> {
        let mut entries = Vec::new();
        loop {
            if let Some(end) = self.eat(Token::CloseBrace) {
                return Ok(Expr::new(ExprKind::Object(entries), open.combine(end)));
            }
            let (tk, span) = self.parse()?;
            let key = match tk {
                Token::Ident => self.source[span].to_owned(),
                Token::String => self.parse_string(span)?,
                Token::Number => self.parse_number(span)?.to_js_string().into_owned(),
                tk => return Err(self.err_unexpected_token("object key", tk, span)),
            };
            let value = if self.eat(Token::Colon).is_some() {
                self.parse_expr()?
            } else if tk == Token::Ident {
                Expr::new(ExprKind::Ident(key.clone()), span)
            } else {
                let (tk, span) = self.parse()?;
                return Err(self.err_unexpected_token("colon", tk, span));
            };
            entries.push((key, value));
            if self.eat(Token::Comma).is_none() {
                let end = self.expect(Token::CloseBrace)?;
                return Ok(Expr::new(ExprKind::Object(entries), open.combine(end)));
            }
        }
    }

    /// Splits a template string into literal parts and interpolations, the
    /// interpolations are parsed recursively.
    fn parse_template(&self, span: Span) -> Result<ExprKind> {
        let bytes = self.source.as_bytes();
        let mut parts = Vec::new();
        let mut buf = String::new();
        let mut i = span.m + 1;
        let end = span.n - 1;
        while i < end {
            match bytes[i] {
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    let j = scan::closing_brace(bytes, i + 1).map_err(|_| {
                        Error::lex("unclosed brace", self.source, i + 1..i + 2)
                    })?;
                    if !buf.is_empty() {
                        parts.push(TemplatePart::Str(std::mem::take(&mut buf)));
                    }
                    let inner = Span::from(i + 2..j - 1);
                    let expr = Parser::new(self.source, inner)?.parse_all()?;
                    parts.push(TemplatePart::Expr(expr));
                    i = j;
                }
                b'\\' => {
                    let (c, len) = self.parse_escape(i)?;
                    buf.push(c);
                    i += len;
                }
                _ => {
                    let c = self.source[i..].chars().next().unwrap_or_default();
                    buf.push(c);
                    i += c.len_utf8();
                }
            }
        }
        if !buf.is_empty() {
            parts.push(TemplatePart::Str(buf));
        }
        Ok(ExprKind::Template(parts))
    }

    /// Parses a string and handles escape characters.
    fn parse_string(&self, span: Span) -> Result<String> {
        let raw = &self.source[span.inner(1, 1)];
        if !raw.contains('\\') {
            return Ok(raw.to_owned());
        }
        let mut string = String::with_capacity(raw.len());
        let mut i = span.m + 1;
        let end = span.n - 1;
        while i < end {
            let c = self.source[i..].chars().next().unwrap_or_default();
            if c == '\\' {
                let (c, len) = self.parse_escape(i)?;
                string.push(c);
                i += len;
            } else {
                string.push(c);
                i += c.len_utf8();
            }
        }
        Ok(string)
    }

    /// Parses the escape sequence starting with the backslash at `i` and
    /// returns the character and the length of the sequence.
    fn parse_escape(&self, i: usize) -> Result<(char, usize)> {
        let esc = self.source[i + 1..].chars().next().unwrap_or_default();
        let c = match esc {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            '\\' | '"' | '\'' | '`' | '$' | '{' | '}' => esc,
            'u' => {
                let hex = self.source.get(i + 2..i + 6).unwrap_or_default();
                return u32::from_str_radix(hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .map(|c| (c, 6))
                    .ok_or_else(|| {
                        Error::syntax("invalid unicode escape", self.source, i..i + 2)
                    });
            }
            _ => {
                let j = i + 1 + esc.len_utf8();
                return Err(Error::syntax("unknown escape character", self.source, i..j));
            }
        };
        Ok((c, 1 + esc.len_utf8()))
    }

    /// Parses an integer or a float.
    fn parse_number(&self, span: Span) -> Result<Value> {
        let raw: String = self.source[span].chars().filter(|&c| c != '_').collect();
        let err = || Error::syntax("invalid number literal", self.source, span);
        let radix = match raw.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return i64::from_str_radix(&raw[2..], radix)
                .map(Value::Integer)
                .map_err(|_| err());
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = raw.parse() {
                return Ok(Value::Integer(i));
            }
        }
        raw.parse().map(Value::Float).map_err(|_| err())
    }

    /// Parses any token.
    fn parse(&mut self) -> Result<(Token, Span)> {
        match self.next() {
            Some(next) => Ok(next),
            None => Err(self.err_unexpected_eof("expression")),
        }
    }

    /// Parses the specified token and returns its span.
    fn expect(&mut self, exp: Token) -> Result<Span> {
        match self.next() {
            Some((tk, span)) if tk == exp => Ok(span),
            Some((tk, span)) => Err(self.err_unexpected_token(exp.human(), tk, span)),
            None => Err(self.err_unexpected_eof(exp.human())),
        }
    }

    /// Consumes the next token if it is the given one.
    fn eat(&mut self, exp: Token) -> Option<Span> {
        match self.peek() {
            Some((tk, span)) if tk == exp => {
                self.pos += 1;
                Some(span)
            }
            _ => None,
        }
    }

    fn peek(&self) -> Option<(Token, Span)> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<(Token, Span)> {
        let next = self.peek();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn err_unexpected_eof(&self, exp: impl Display) -> Error {
        let n = self.span.n;
        Error::syntax(format!("expected {exp}, found end of expression"), self.source, n..n)
    }

    fn err_unexpected_token(&self, exp: impl Display, got: Token, span: Span) -> Error {
        let got = got.human();
        Error::syntax(format!("expected {exp}, found {got}"), self.source, span)
    }
}

fn member(object: Expr, property: String, span: Span, optional: bool) -> Expr {
    let span = object.span.combine(span);
    Expr::new(
        ExprKind::Member {
            object: Box::new(object),
            property,
            optional,
        },
        span,
    )
}

fn binary_op(tk: Token) -> Option<BinaryOp> {
    let op = match tk {
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Rem,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Lt => BinaryOp::Lt,
        Token::Gt => BinaryOp::Gt,
        Token::Le => BinaryOp::Le,
        Token::Ge => BinaryOp::Ge,
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::Ne,
        Token::EqEqEq => BinaryOp::StrictEq,
        Token::NotEqEq => BinaryOp::StrictNe,
        Token::AndAnd => BinaryOp::And,
        Token::OrOr => BinaryOp::Or,
        Token::Nullish => BinaryOp::Nullish,
        _ => return None,
    };
    Some(op)
}
