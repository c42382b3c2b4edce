use std::cmp::max;
use std::fmt;

use crate::types::span::Span;

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An unmatched brace or an unterminated string.
    Lex,
    /// A malformed directive or expression.
    Syntax,
    /// A closing directive or tag that does not match what is open, or a
    /// block left open at the end of the template.
    BlockMismatch,
    /// A malformed attribute or component name.
    AttributeName,
    /// An expression failed while rendering.
    Eval,
    /// A user method or function returned an error.
    Method,
}

/// An error that can occur during template compilation, rendering or event
/// dispatch.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    name: Option<String>,
    span: Option<(String, Span)>,
}

impl Error {
    fn new(kind: ErrorKind, msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        assert!(!source.is_empty(), "source must be populated");
        Self {
            kind,
            msg: msg.into(),
            name: None,
            span: Some((source.to_owned(), span.into())),
        }
    }

    pub(crate) fn lex(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Lex, msg, source, span)
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Syntax, msg, source, span)
    }

    pub(crate) fn block_mismatch(
        msg: impl Into<String>,
        source: &str,
        span: impl Into<Span>,
    ) -> Self {
        Self::new(ErrorKind::BlockMismatch, msg, source, span)
    }

    pub(crate) fn attribute_name(
        msg: impl Into<String>,
        source: &str,
        span: impl Into<Span>,
    ) -> Self {
        Self::new(ErrorKind::AttributeName, msg, source, span)
    }

    pub(crate) fn eval(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Eval, msg, source, span)
    }

    /// An error without a location, raised by a builtin or a value method.
    pub(crate) fn message(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            name: None,
            span: None,
        }
    }

    /// Attaches a location to an error that was raised without one, for
    /// example from within a user function.
    pub(crate) fn enrich(mut self, source: &str, span: Span) -> Self {
        if self.span.is_none() && !source.is_empty() {
            self.span = Some((source.to_owned(), span));
        }
        self
    }

    pub(crate) fn with_template_name(mut self, name: Option<&str>) -> Self {
        if self.name.is_none() {
            self.name = name.map(ToOwned::to_owned);
        }
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message without any location information.
    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Returns the name of the template this error occurred in, if it was
    /// compiled with one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the byte range in the template source this error refers to.
    pub fn span(&self) -> Option<(usize, usize)> {
        self.span.as_ref().map(|(_, s)| (s.m, s.n))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::message(ErrorKind::Method, msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::message(ErrorKind::Method, msg)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::message(ErrorKind::Eval, err.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, self.name(), source, *span, f),
            None => write!(f, "{}", self.msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => {
                if f.alternate() {
                    fmt_pretty(&self.msg, self.name(), source, *span, f)
                } else {
                    write!(f, "{} between bytes {} and {}", self.msg, span.m, span.n)
                }
            }
            None => write!(f, "{}", self.msg),
        }
    }
}

fn fmt_pretty(
    msg: &str,
    name: Option<&str>,
    source: &str,
    span: Span,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let first = source[span].split('\n').next().unwrap_or_default();
    let width = max(1, display_width(first));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = display_width(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    if let Some(name) = name {
        write!(f, "\n {0:pad$}--> {name}:{1}:{2}", "", line + 1, col + 1)?;
    }

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

/// Converts a byte offset into a zero-based line and display column.
fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            let col = offset - n;
            let col = line.get(..col).map(display_width).unwrap_or(col);
            return (i, col);
        }
        n += len;
    }
    let last = lines.last().copied().unwrap_or_default();
    (lines.len().saturating_sub(1), display_width(last))
}

#[cfg(feature = "unicode")]
fn display_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn display_width(s: &str) -> usize {
    s.chars().count()
}
