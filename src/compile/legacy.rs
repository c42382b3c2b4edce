//! Converts the older double brace dialect into the primary syntax.
//!
//! The legacy dialect writes `{{#if cond}}...{{/if}}`, `{{name}}` and
//! `{{{markup}}}`. A single brace is plain text there. Reusable fragments
//! are declared with `{{#block name}}...{{/block}}` and referenced with
//! `{{> name}}`.
//!
//! This is a pure text rewrite. The output never contains `{{`, so running
//! it twice gives the same result as running it once.

use std::collections::BTreeMap;

use crate::types::span::Span;
use crate::{Error, Result};

/// Returns true if the source uses the legacy dialect.
pub fn detect(source: &str) -> bool {
    match source.find("{{").or_else(|| source.find("{%")) {
        Some(i) => source[i..].contains("}}") || source[i..].contains("%}"),
        None => false,
    }
}

/// Converts a legacy template into the primary syntax.
///
/// `name` identifies the component in the emitted warning.
pub fn normalize(source: &str, name: Option<&str>) -> Result<String> {
    if !detect(source) {
        return Ok(source.to_owned());
    }
    tracing::warn!(
        component = name.unwrap_or("anonymous"),
        "template uses the legacy double brace syntax"
    );

    // Same length replacement so spans still line up with the original.
    let unified = source.replace("{%", "{{").replace("%}", "}}");
    let expanded = Fragments::collect(&unified)?.expand()?;
    convert(&expanded)
}

/// The named fragments declared in a template.
struct Fragments<'a> {
    source: &'a str,
    /// The template without the fragment declarations.
    main: Vec<Span>,
    decls: BTreeMap<&'a str, Span>,
}

impl<'a> Fragments<'a> {
    fn collect(source: &'a str) -> Result<Self> {
        const OPEN: &str = "{{#block";
        const CLOSE: &str = "{{/block}}";

        let mut main = Vec::new();
        let mut decls = BTreeMap::new();
        let mut i = 0;
        while let Some(j) = find(source, i, source.len(), OPEN) {
            main.push(Span::from(i..j));
            let k = find(source, j, source.len(), "}}").ok_or_else(|| {
                Error::syntax("unclosed `{{#block`", source, j..j + OPEN.len())
            })?;
            let name = source[j + OPEN.len()..k].trim();
            if name.is_empty() {
                return Err(Error::syntax("expected fragment name", source, j..k + 2));
            }
            let end = find(source, k, source.len(), CLOSE).ok_or_else(|| {
                Error::syntax(
                    format!("unclosed fragment `{name}`"),
                    source,
                    j..k + 2,
                )
            })?;
            decls.insert(name, Span::from(k + 2..end));
            i = end + CLOSE.len();
        }
        main.push(Span::from(i..source.len()));
        Ok(Self {
            source,
            main,
            decls,
        })
    }

    fn expand(&self) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut stack = Vec::new();
        for span in &self.main {
            self.expand_into(*span, &mut stack, &mut out)?;
        }
        Ok(out)
    }

    fn expand_into(&self, span: Span, stack: &mut Vec<&'a str>, out: &mut String) -> Result<()> {
        let mut i = span.m;
        while let Some(j) = find(self.source, i, span.n, "{{>") {
            out.push_str(&self.source[i..j]);
            let k = find(self.source, j, span.n, "}}").ok_or_else(|| {
                Error::syntax("unclosed fragment reference", self.source, j..j + 3)
            })?;
            let name = self.source[j + 3..k].trim();
            let body = *self.decls.get(name).ok_or_else(|| {
                Error::syntax(format!("unknown fragment `{name}`"), self.source, j..k + 2)
            })?;
            if stack.contains(&name) {
                return Err(Error::syntax(
                    format!("fragment `{name}` references itself"),
                    self.source,
                    j..k + 2,
                ));
            }
            stack.push(name);
            self.expand_into(body, stack, out)?;
            stack.pop();
            i = k + 2;
        }
        out.push_str(&self.source[i..span.n]);
        Ok(())
    }
}

/// Converts every double brace tag and escapes single braces.
fn convert(source: &str) -> Result<String> {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                out.push_str(&source[last..i]);
                let triple = bytes.get(i + 2) == Some(&b'{');
                let (open, close) = if triple { (3, "}}}") } else { (2, "}}") };
                let end = close_of(bytes, i + open, close.as_bytes()).ok_or_else(|| {
                    Error::syntax("unclosed `{{`", source, i..i + open)
                })?;
                convert_tag(source, Span::from(i + open..end), triple, &mut out)?;
                i = end + close.len();
                last = i;
            }
            b'{' => {
                out.push_str(&source[last..i]);
                out.push_str("\\{");
                i += 1;
                last = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&source[last..]);
    Ok(out)
}

fn convert_tag(source: &str, span: Span, triple: bool, out: &mut String) -> Result<()> {
    let tag = source[span].trim();
    if triple {
        push_directive(out, "@html ", tag);
        return Ok(());
    }

    let (keyword, rest) = split_keyword(tag);
    match keyword {
        _ if tag.starts_with('!') => {}
        _ if tag.starts_with('&') => push_directive(out, "@html ", tag[1..].trim()),
        "html" if !rest.is_empty() => push_directive(out, "@html ", rest),
        "json" if !rest.is_empty() => push_directive(out, "@json ", rest),
        "#if" | "#unless" | "#for" => {
            out.push('{');
            out.push_str(keyword);
            out.push(' ');
            out.push_str(rest);
            out.push('}');
        }
        "#each" => {
            let (collection, binding) = match rest.rfind(" as ") {
                Some(k) => {
                    let binding = rest[k + 4..].trim();
                    let binding = binding
                        .strip_prefix('|')
                        .and_then(|b| b.strip_suffix('|'))
                        .unwrap_or(binding);
                    (rest[..k].trim(), binding.trim())
                }
                None => (rest, "item"),
            };
            out.push_str("{#each ");
            out.push_str(collection);
            out.push_str(" as ");
            out.push_str(binding);
            out.push('}');
        }
        "else" if rest.is_empty() => out.push_str("{:else}"),
        "else" if split_keyword(rest).0 == "if" => {
            out.push_str("{:else ");
            out.push_str(rest);
            out.push('}');
        }
        "/if" | "/unless" | "/each" | "/for" if rest.is_empty() => {
            out.push('{');
            out.push_str(keyword);
            out.push('}');
        }
        kw if kw.starts_with('#') || kw.starts_with('/') || kw.starts_with('>') => {
            return Err(Error::syntax(
                format!("unknown legacy directive `{kw}`"),
                source,
                span,
            ));
        }
        _ => {
            if tag.starts_with('{') || tag.ends_with('}') {
                push_directive(out, " ", &format!("{tag} "));
            } else {
                push_directive(out, "", tag);
            }
        }
    }
    Ok(())
}

fn push_directive(out: &mut String, prefix: &str, body: &str) {
    out.push('{');
    out.push_str(prefix);
    out.push_str(body);
    out.push('}');
}

fn split_keyword(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn find(source: &str, from: usize, to: usize, pat: &str) -> Option<usize> {
    source[from..to].find(pat).map(|i| from + i)
}

/// Finds the closing delimiter of a double brace tag, skipping strings.
fn close_of(bytes: &[u8], mut i: usize, close: &[u8]) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            q @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ if bytes[i..].starts_with(close) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    fn norm(source: &str) -> String {
        normalize(source, None).unwrap()
    }

    #[test]
    fn legacy_detect() {
        assert!(detect("<p>{{ name }}</p>"));
        assert!(detect("{% if x %}a{% /if %}"));
        assert!(!detect("<p>{name}</p>"));
        assert!(!detect("{{ never closed"));
    }

    #[test]
    fn legacy_expressions() {
        assert_eq!(norm("<p>{{ name }} and {{count}}</p>"), "<p>{name} and {count}</p>");
        assert_eq!(norm("{{ {a: 1}.a }}"), "{ {a: 1}.a }");
        assert_eq!(norm(r#"{{ "}}" }}"#), r#"{"}}"}"#);
    }

    #[test]
    fn legacy_control_flow() {
        assert_eq!(
            norm("{{#if a}}x{{else if b}}y{{else}}z{{/if}}"),
            "{#if a}x{:else if b}y{:else}z{/if}"
        );
        assert_eq!(norm("{{#unless a}}x{{/unless}}"), "{#unless a}x{/unless}");
        assert_eq!(norm("{% #for k in m %}{{k}}{% /for %}"), "{#for k in m}{k}{/for}");
    }

    #[test]
    fn legacy_each() {
        assert_eq!(
            norm("{{#each todos as |todo, i|}}{{i}}{{/each}}"),
            "{#each todos as todo, i}{i}{/each}"
        );
        assert_eq!(norm("{{#each todos as todo}}{{/each}}"), "{#each todos as todo}{/each}");
        assert_eq!(norm("{{#each todos}}{{item}}{{/each}}"), "{#each todos as item}{item}{/each}");
    }

    #[test]
    fn legacy_raw() {
        assert_eq!(norm("{{{ body }}}"), "{@html body}");
        assert_eq!(norm("{{& body }}"), "{@html body}");
        assert_eq!(norm("{{html body}}"), "{@html body}");
        assert_eq!(norm("{{json state}}"), "{@json state}");
        assert_eq!(norm("a{{! a comment }}b"), "ab");
    }

    #[test]
    fn legacy_single_brace_is_text() {
        assert_eq!(norm("{{x}} function() { return 1; }"), r"{x} function() \{ return 1; }");
    }

    #[test]
    fn legacy_fragments() {
        let source = "{{#block item}}<li>{{name}}</li>{{/block}}<ul>{{> item}}{{> item}}</ul>";
        assert_eq!(norm(source), "<ul><li>{name}</li><li>{name}</li></ul>");

        let source = "{{#block a}}[{{> b}}]{{/block}}{{#block b}}b{{/block}}{{> a}}";
        assert_eq!(norm(source), "[b]");
    }

    #[test]
    fn legacy_err_fragments() {
        let err = normalize("{{> missing}}", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.msg(), "unknown fragment `missing`");

        let err = normalize("{{#block a}}{{> a}}{{/block}}{{> a}}", None).unwrap_err();
        assert_eq!(err.msg(), "fragment `a` references itself");
    }

    #[test]
    fn legacy_err_unknown_directive() {
        let err = normalize("{{#with x}}{{/with}}", None).unwrap_err();
        assert_eq!(err.msg(), "unknown legacy directive `#with`");
    }

    #[test]
    fn legacy_idempotent() {
        for source in [
            "{{#each xs as |x, i|}}<b onclick={{ remove(i) }}>{{x}}</b>{{/each}}",
            "{{#if a}}{{{ raw }}}{{/if}} { literal }",
            "<p>{plain}</p>",
        ] {
            let once = norm(source);
            assert_eq!(norm(&once), once);
            assert!(!once.contains("{{"));
        }
    }
}
