//! Delimiter matching shared by the template lexer and the tag parser.
//!
//! All delimiters are ASCII, so scanning works on bytes. A UTF-8 continuation
//! byte never equals an ASCII byte so multi-byte characters pass through.

/// A delimiter that was opened but never closed, with the offset of the
/// opening byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unclosed {
    Brace(usize),
    Quote(usize),
    Tag(usize),
}

/// Returns the index just past the `}` matching the `{` at `open`.
///
/// Braces inside quoted strings are ignored. Inside a template string the
/// `${...}` interpolations are matched recursively.
pub fn closing_brace(s: &[u8], open: usize) -> Result<usize, Unclosed> {
    debug_assert_eq!(s[open], b'{');
    let mut depth = 0usize;
    let mut i = open;
    while i < s.len() {
        match s[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            q @ (b'"' | b'\'' | b'`') => {
                i = quoted(s, i, q, true)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Err(Unclosed::Brace(open))
}

/// Returns the index just past the `>` that ends the tag starting at `open`.
///
/// Quoted attribute values and braced attribute expressions may contain `>`.
pub fn tag_end(s: &[u8], open: usize) -> Result<usize, Unclosed> {
    debug_assert_eq!(s[open], b'<');
    let mut i = open + 1;
    while i < s.len() {
        match s[i] {
            b'>' => return Ok(i + 1),
            q @ (b'"' | b'\'') => {
                i = quoted(s, i, q, false)?;
                continue;
            }
            b'{' => {
                i = closing_brace(s, i)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Err(Unclosed::Tag(open))
}

/// Returns the index just past the quote that closes the one at `open`.
///
/// Expression strings support backslash escapes, attribute values do not.
pub fn quoted(s: &[u8], open: usize, quote: u8, escapes: bool) -> Result<usize, Unclosed> {
    let mut i = open + 1;
    while i < s.len() {
        match s[i] {
            b'\\' if escapes => i += 1,
            b'$' if escapes && quote == b'`' && s.get(i + 1) == Some(&b'{') => {
                i = closing_brace(s, i + 1)?;
                continue;
            }
            c if c == quote => return Ok(i + 1),
            _ => {}
        }
        i += 1;
    }
    Err(Unclosed::Quote(open))
}
