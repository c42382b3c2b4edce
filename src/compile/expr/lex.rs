use crate::compile::scan;
use crate::types::span::Span;
use crate::{Error, Result};

/// A lexer that tokenizes a single embedded expression.
///
/// Like the template lexer it is a fallible iterator, except that whitespace
/// is skipped. Spans are relative to the whole template source so that errors
/// point at the right place.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Lexer<'source> {
    /// The original template source.
    pub source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// The end of the expression in the template source.
    end: usize,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// An identifier or keyword, e.g. `todo` or `typeof`
    Ident,
    /// An integer or float literal, e.g. `19`, `0.5` or `0x7f`
    Number,
    /// A string literal, e.g. `"done"` or `'done'`
    String,
    /// A template string literal, e.g. `` `${n} left` ``
    Template,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `?.`
    QuestionDot,
    /// `?`
    Question,
    /// `??`
    Nullish,
    /// `=>`
    Arrow,
    /// `!`
    Bang,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `===`
    EqEqEq,
    /// `!==`
    NotEqEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer over the given region of the source.
    pub fn new(source: &'source str, span: Span) -> Self {
        Self {
            source,
            cursor: span.m,
            end: span.n,
        }
    }

    /// Returns the next non-whitespace token and its span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        let region = &self.source[self.cursor..self.end];
        let skipped = region.len() - region.trim_start().len();
        self.cursor += skipped;

        let i = self.cursor;
        let mut iter = self.source[i..self.end]
            .char_indices()
            .map(|(d, c)| (i + d, c));

        let c = match iter.next() {
            Some((_, c)) => c,
            None => return Ok(None),
        };

        let next = self.source[i + c.len_utf8()..self.end].chars().next();
        let next2 = self.source[i + c.len_utf8()..self.end].chars().nth(1);

        let (tk, j) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (Token::EqEqEq, i + 3),
            ('!', Some('='), Some('=')) => (Token::NotEqEq, i + 3),
            ('=', Some('='), _) => (Token::EqEq, i + 2),
            ('!', Some('='), _) => (Token::NotEq, i + 2),
            ('=', Some('>'), _) => (Token::Arrow, i + 2),
            ('<', Some('='), _) => (Token::Le, i + 2),
            ('>', Some('='), _) => (Token::Ge, i + 2),
            ('&', Some('&'), _) => (Token::AndAnd, i + 2),
            ('|', Some('|'), _) => (Token::OrOr, i + 2),
            ('?', Some('?'), _) => (Token::Nullish, i + 2),
            // `a ?.5 : b` is a conditional, not an optional member access.
            ('?', Some('.'), n) if !matches!(n, Some(n) if n.is_ascii_digit()) => {
                (Token::QuestionDot, i + 2)
            }
            ('?', _, _) => (Token::Question, i + 1),
            ('(', _, _) => (Token::OpenParen, i + 1),
            (')', _, _) => (Token::CloseParen, i + 1),
            ('[', _, _) => (Token::OpenBracket, i + 1),
            (']', _, _) => (Token::CloseBracket, i + 1),
            ('{', _, _) => (Token::OpenBrace, i + 1),
            ('}', _, _) => (Token::CloseBrace, i + 1),
            (',', _, _) => (Token::Comma, i + 1),
            (':', _, _) => (Token::Colon, i + 1),
            ('!', _, _) => (Token::Bang, i + 1),
            ('+', _, _) => (Token::Plus, i + 1),
            ('-', _, _) => (Token::Minus, i + 1),
            ('*', _, _) => (Token::Star, i + 1),
            ('/', _, _) => (Token::Slash, i + 1),
            ('%', _, _) => (Token::Percent, i + 1),
            ('<', _, _) => (Token::Lt, i + 1),
            ('>', _, _) => (Token::Gt, i + 1),
            ('.', Some(n), _) if n.is_ascii_digit() => self.lex_number(iter),
            ('.', _, _) => (Token::Dot, i + 1),
            ('"' | '\'' | '`', _, _) => self.lex_string(c, i)?,
            (c, _, _) if c.is_ascii_digit() => self.lex_number(iter),
            (c, _, _) if is_ident_start(c) => (Token::Ident, self.lex_while(iter, is_ident)),
            (c, _, _) => {
                return Err(self.err_unexpected_character(i..(i + c.len_utf8())));
            }
        };

        self.cursor = j;
        Ok(Some((tk, Span::from(i..j))))
    }

    /// Lexes the whole expression.
    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>> {
        let mut tokens = Vec::new();
        while let Some(next) = self.next()? {
            tokens.push(next);
        }
        Ok(tokens)
    }

    fn lex_string(&mut self, quote: char, i: usize) -> Result<(Token, usize)> {
        let bytes = &self.source.as_bytes()[..self.end];
        match scan::quoted(bytes, i, quote as u8, true) {
            Ok(j) if quote == '`' => Ok((Token::Template, j)),
            Ok(j) => Ok((Token::String, j)),
            Err(_) => Err(Error::lex(
                "undelimited string",
                self.source,
                i..self.end,
            )),
        }
    }

    fn lex_number<I>(&mut self, mut iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut prev = '\0';
        loop {
            match iter.clone().next() {
                Some((_, c))
                    if c.is_ascii_alphanumeric()
                        || c == '.'
                        || c == '_'
                        || (matches!(c, '+' | '-') && matches!(prev, 'e' | 'E')) =>
                {
                    prev = c;
                    iter.next();
                }
                Some((j, _)) => return (Token::Number, j),
                None => return (Token::Number, self.end),
            }
        }
    }

    fn lex_while<I, P>(&mut self, mut iter: I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.end,
            }
        }
    }

    fn err_unexpected_character(&self, span: impl Into<Span>) -> Error {
        Error::syntax("unexpected character", self.source, span)
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Ident => "identifier",
            Self::Number => "number",
            Self::String => "string",
            Self::Template => "template string",
            Self::OpenParen => "`(`",
            Self::CloseParen => "`)`",
            Self::OpenBracket => "`[`",
            Self::CloseBracket => "`]`",
            Self::OpenBrace => "`{`",
            Self::CloseBrace => "`}`",
            Self::Comma => "comma",
            Self::Colon => "colon",
            Self::Dot => "member access operator",
            Self::QuestionDot => "optional member access operator",
            Self::Question => "`?`",
            Self::Nullish => "`??`",
            Self::Arrow => "`=>`",
            Self::Bang => "`!`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Lt => "`<`",
            Self::Gt => "`>`",
            Self::Le => "`<=`",
            Self::Ge => "`>=`",
            Self::EqEq => "`==`",
            Self::NotEq => "`!=`",
            Self::EqEqEq => "`===`",
            Self::NotEqEq => "`!==`",
            Self::AndAnd => "`&&`",
            Self::OrOr => "`||`",
        }
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    c == '$' || unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_' | '$')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_' | '$')
}
