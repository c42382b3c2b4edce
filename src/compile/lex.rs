use crate::compile::scan::{self, Unclosed};
use crate::types::span::Span;
use crate::{Error, Result};

/// A lexer that chunks the template source into text, tags and expressions
/// so that the compiler doesn't have to operate on raw text.
///
/// The lexer is implemented as a fallible iterator. The compiler should
/// repeatedly call the [`.next()?`][Lexer::next] method to return the next
/// token until [`None`] is returned.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Lexer<'source> {
    /// The original template source.
    pub source: &'source str,

    /// A cursor over the template source.
    cursor: usize,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Literal template markup
    Text,
    /// A complete tag including the angle brackets, e.g. `<li class="x">`
    Tag,
    /// The inside of a braced expression or directive, e.g. `#if done`
    Expr,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer.
    pub fn new(source: &'source str) -> Self {
        Self { source, cursor: 0 }
    }

    /// Returns the next token and span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        let bytes = self.source.as_bytes();
        loop {
            let i = self.cursor;
            if i >= bytes.len() {
                return Ok(None);
            }

            match bytes[i] {
                // An escaped brace is literal text, the backslash is dropped.
                b'\\' if bytes.get(i + 1) == Some(&b'{') => {
                    self.cursor = i + 2;
                    return Ok(Some((Token::Text, Span::from(i + 1..i + 2))));
                }

                b'{' => {
                    let j = scan::closing_brace(bytes, i).map_err(|u| self.err_unclosed(u))?;
                    self.cursor = j;
                    return Ok(Some((Token::Expr, Span::from(i + 1..j - 1))));
                }

                b'<' if self.source[i..].starts_with("<!--") => {
                    self.cursor = match self.source[i + 4..].find("-->") {
                        Some(j) => i + 4 + j + 3,
                        None => bytes.len(),
                    };
                    continue;
                }

                b'<' if is_tag_start(bytes.get(i + 1)) => match scan::tag_end(bytes, i) {
                    Ok(j) => {
                        self.cursor = j;
                        return Ok(Some((Token::Tag, Span::from(i..j))));
                    }
                    Err(_) => {
                        tracing::warn!(offset = i, "unterminated tag, treating it as text");
                        self.cursor = bytes.len();
                        return Ok(Some((Token::Text, Span::from(i..bytes.len()))));
                    }
                },

                _ => {
                    let j = self.text_end(i + 1);
                    self.cursor = j;
                    return Ok(Some((Token::Text, Span::from(i..j))));
                }
            }
        }
    }

    /// Finds the end of a run of text starting before `i`.
    fn text_end(&self, mut i: usize) -> usize {
        let bytes = self.source.as_bytes();
        while i < bytes.len() {
            match bytes[i] {
                b'{' => return i,
                b'\\' if bytes.get(i + 1) == Some(&b'{') => return i,
                b'<' if is_tag_start(bytes.get(i + 1)) => return i,
                _ => i += 1,
            }
        }
        i
    }

    fn err_unclosed(&self, unclosed: Unclosed) -> Error {
        match unclosed {
            Unclosed::Brace(i) => Error::lex("unclosed brace", self.source, i..i + 1),
            Unclosed::Quote(i) => Error::lex("undelimited string", self.source, i..i + 1),
            Unclosed::Tag(i) => Error::lex("unclosed tag", self.source, i..i + 1),
        }
    }
}

fn is_tag_start(b: Option<&u8>) -> bool {
    matches!(b, Some(b) if b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_text() {
        let tokens = lex("lorem ipsum").unwrap();
        assert_eq!(tokens, [(Token::Text, "lorem ipsum")]);
    }

    #[test]
    fn lex_text_with_less_than() {
        let tokens = lex("a < b <3").unwrap();
        assert_eq!(tokens, [(Token::Text, "a < b <3")]);
    }

    #[test]
    fn lex_tags_and_exprs() {
        let tokens = lex(r#"<li class="x">{todo.text}</li>"#).unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Tag, r#"<li class="x">"#),
                (Token::Expr, "todo.text"),
                (Token::Tag, "</li>"),
            ]
        );
    }

    #[test]
    fn lex_directive_with_nested_braces() {
        let tokens = lex("{#each items as {a, b}}x{/each}").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Expr, "#each items as {a, b}"),
                (Token::Text, "x"),
                (Token::Expr, "/each"),
            ]
        );
    }

    #[test]
    fn lex_expr_with_quoted_braces() {
        let tokens = lex(r#"a {"}" + `${b}`} c"#).unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "a "),
                (Token::Expr, r#""}" + `${b}`"#),
                (Token::Text, " c"),
            ]
        );
    }

    #[test]
    fn lex_escaped_brace() {
        let tokens = lex(r"function() \{ return 1; }").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "function() "),
                (Token::Text, "{"),
                (Token::Text, " return 1; }"),
            ]
        );
    }

    #[test]
    fn lex_comment_dropped() {
        let tokens = lex("a<!-- {oops -->b").unwrap();
        assert_eq!(tokens, [(Token::Text, "a"), (Token::Text, "b")]);

        let tokens = lex("a<!-- never closed").unwrap();
        assert_eq!(tokens, [(Token::Text, "a")]);
    }

    #[test]
    fn lex_tag_with_expression_attribute() {
        let tokens = lex("<button onclick={() => a > b}>go</button>").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Tag, "<button onclick={() => a > b}>"),
                (Token::Text, "go"),
                (Token::Tag, "</button>"),
            ]
        );
    }

    #[test]
    fn lex_unterminated_tag_is_text() {
        let tokens = lex("a <div class='x'").unwrap();
        assert_eq!(tokens, [(Token::Text, "a "), (Token::Text, "<div class='x'")]);
    }

    #[test]
    fn lex_err_unclosed_brace() {
        let err = lex("lorem {ipsum").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.to_string(), "unclosed brace between bytes 6 and 7");
    }

    #[test]
    fn lex_err_undelimited_string() {
        let err = lex("{'abc}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(
            format!("{:#}", err),
            r#"
   |
 1 | {'abc}
   |  ^ undelimited string
"#
        );
    }

    fn lex(source: &str) -> Result<Vec<(Token, &str)>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some((tk, span)) = lexer.next()? {
            tokens.push((tk, &source[span]));
        }
        Ok(tokens)
    }
}
