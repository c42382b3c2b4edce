//! Parses a single raw tag token into a [`ParsedTag`].

use crate::compile::scan::{self, Unclosed};
use crate::types::span::Span;
use crate::{Error, Result};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub is_closing: bool,
    pub is_self_closing: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Static(String),
    /// The span of the expression inside the braces.
    Dynamic(Span),
    Boolean,
}

impl ParsedTag {
    pub fn is_void(&self) -> bool {
        is_void(&self.name)
    }
}

impl Attribute {
    #[cfg(test)]
    pub fn is_dynamic(&self) -> bool {
        matches!(self.value, AttrValue::Dynamic(_))
    }

    #[cfg(test)]
    pub fn is_boolean(&self) -> bool {
        matches!(self.value, AttrValue::Boolean)
    }

    /// Returns the event name if this attribute is an event handler, e.g.
    /// `click` for `onclick={..}`.
    pub fn event(&self) -> Option<&str> {
        match self.value {
            AttrValue::Dynamic(_) => self.name.strip_prefix("on").filter(|e| !e.is_empty()),
            _ => None,
        }
    }
}

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parse the tag token at `span`, which includes the angle brackets.
pub fn parse(source: &str, span: Span) -> Result<ParsedTag> {
    Parser {
        source,
        cursor: span.m + 1,
        end: span.n - 1,
    }
    .parse_tag(span)
}

struct Parser<'source> {
    source: &'source str,
    cursor: usize,
    end: usize,
}

impl<'source> Parser<'source> {
    fn parse_tag(mut self, span: Span) -> Result<ParsedTag> {
        let is_closing = self.eat('/');

        let m = self.cursor;
        if !matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            return Err(Error::syntax("expected tag name", self.source, span));
        }
        let n = self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let name = normalize_name(self.source, Span::from(m..n))?;

        let mut attributes = Vec::new();
        let mut is_self_closing = false;
        loop {
            self.eat_while(char::is_whitespace);
            match self.peek() {
                None => break,
                Some('/') if self.cursor + 1 == self.end => {
                    self.cursor += 1;
                    is_self_closing = true;
                    break;
                }
                Some(_) => attributes.push(self.parse_attribute()?),
            }
        }

        Ok(ParsedTag {
            name,
            attributes,
            is_closing,
            is_self_closing,
            span,
        })
    }

    fn parse_attribute(&mut self) -> Result<Attribute> {
        let m = self.cursor;
        let n = self.eat_while(is_attr_name);
        if m == n {
            let n = self.eat_while(|c| !c.is_whitespace() && c != '=');
            let n = if n == m { m + 1 } else { n };
            return Err(Error::attribute_name(
                "invalid attribute name",
                self.source,
                m..n.min(self.end),
            ));
        }
        if let Some(c) = self.peek() {
            if !c.is_whitespace() && c != '=' && c != '/' {
                let j = self.eat_while(|c| !c.is_whitespace() && c != '=');
                return Err(Error::attribute_name(
                    "invalid attribute name",
                    self.source,
                    m..j,
                ));
            }
        }
        let name = self.source[m..n].to_owned();

        let checkpoint = self.cursor;
        self.eat_while(char::is_whitespace);
        if !self.eat('=') {
            self.cursor = checkpoint;
            return Ok(Attribute {
                name,
                value: AttrValue::Boolean,
                span: Span::from(m..n),
            });
        }
        self.eat_while(char::is_whitespace);

        let bytes = self.source.as_bytes();
        let i = self.cursor;
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                let j = scan::quoted(bytes, i, q as u8, false).map_err(|u| self.err_unclosed(u))?;
                let j = j.min(self.end);
                self.cursor = j;
                AttrValue::Static(self.source[i + 1..j - 1].to_owned())
            }
            Some('{') => {
                let j = scan::closing_brace(bytes, i).map_err(|u| self.err_unclosed(u))?;
                self.cursor = j;
                AttrValue::Dynamic(Span::from(i + 1..j - 1))
            }
            Some(_) => {
                let j = self.eat_while(|c| !c.is_whitespace());
                // A trailing `/` belongs to a self-closing tag, not the value.
                let j = if j == self.end && self.source[i..j].ends_with('/') && j - 1 > i {
                    self.cursor = j - 1;
                    j - 1
                } else {
                    j
                };
                AttrValue::Static(self.source[i..j].to_owned())
            }
            None => {
                return Err(Error::syntax(
                    "expected attribute value",
                    self.source,
                    m..self.cursor,
                ))
            }
        };

        Ok(Attribute {
            name,
            value,
            span: Span::from(m..self.cursor),
        })
    }

    fn peek(&self) -> Option<char> {
        self.source[self.cursor..self.end].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.cursor += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_while<P>(&mut self, pred: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.cursor += c.len_utf8();
        }
        self.cursor
    }

    fn err_unclosed(&self, unclosed: Unclosed) -> Error {
        match unclosed {
            Unclosed::Brace(i) => Error::lex("unclosed brace", self.source, i..i + 1),
            Unclosed::Quote(i) | Unclosed::Tag(i) => {
                Error::lex("undelimited string", self.source, i..i + 1)
            }
        }
    }
}

/// Lower case element names pass through, a name with an upper case letter
/// is a component and is converted to kebab-case.
fn normalize_name(source: &str, span: Span) -> Result<String> {
    let raw = &source[span];
    if !raw.chars().any(|c| c.is_ascii_uppercase()) {
        return Ok(raw.to_owned());
    }
    let kebab = to_kebab_case(raw);
    if !kebab.contains('-') {
        return Err(Error::attribute_name(
            format!("invalid component name `{raw}`, expected at least two words"),
            source,
            span,
        ));
    }
    Ok(kebab)
}

pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.char_indices() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(feature = "unicode")]
fn is_attr_name(c: char) -> bool {
    c == '-' || unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_attr_name(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_' | '-')
}
