//! The render tree produced by a template.

use std::fmt;

use crate::compile::tag;
use crate::handlers::Handler;
use crate::render::Scope;
use crate::types::program::ActionId;

/// An ordered list of rendered nodes.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Text that is escaped on output.
    Text(String),
    /// Trusted markup that is written verbatim.
    Html(String),
    /// The anchor of a render action that can be re-run in place.
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    /// Attributes in declaration order, `None` is a boolean attribute.
    pub attrs: Vec<(String, Option<String>)>,
    pub events: Vec<EventBinding>,
    pub children: Vec<Node>,
    /// Set for subtrees a patcher should preserve, e.g. `slot:default`.
    pub key: Option<String>,
    pub(crate) bindings: Vec<AttrBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub event: String,
    pub handler: Handler,
}

/// A dynamic attribute and what is needed to evaluate it again.
#[derive(Debug, Clone)]
pub(crate) struct AttrBinding {
    pub action: ActionId,
    pub pc: usize,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub action: ActionId,
    pub children: Vec<Node>,
    /// The first and last instruction of the region.
    pub(crate) range: (usize, usize),
    /// The loop variables in scope where the block was rendered.
    pub(crate) scope: Scope,
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Serializes the tree as HTML.
    pub fn to_html(&self) -> String {
        self.to_string()
    }

    /// The keys of every subtree that should be preserved, in tree order.
    pub fn preserved_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let Node::Element(Element { key: Some(key), .. }) = node {
                keys.push(key.as_str());
            }
        });
        keys
    }

    /// Every event binding in the tree, in tree order.
    pub fn events(&self) -> Vec<&EventBinding> {
        let mut events = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let Node::Element(el) = node {
                events.extend(&el.events);
            }
        });
        events
    }

    /// Every element with the given tag name, in tree order.
    pub fn find_all(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        walk(&self.nodes, &mut |node| match node {
            Node::Element(el) if el.tag == tag => found.push(el),
            _ => {}
        });
        found
    }

    /// The rendered blocks for the given action, in tree order.
    pub fn blocks(&self, action: ActionId) -> Vec<&Block> {
        let mut found = Vec::new();
        walk(&self.nodes, &mut |node| match node {
            Node::Block(block) if block.action == action => found.push(block),
            _ => {}
        });
        found
    }
}

impl Element {
    pub(crate) fn new(tag: &str, key: Option<String>) -> Self {
        Self {
            tag: tag.to_owned(),
            attrs: Vec::new(),
            events: Vec::new(),
            children: Vec::new(),
            key,
            bindings: Vec::new(),
        }
    }

    /// Returns the attribute value, `Some(None)` for a boolean attribute.
    pub fn attr(&self, name: &str) -> Option<Option<&str>> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    /// Sets, replaces or removes an attribute keeping its position.
    pub(crate) fn set_attr(&mut self, name: &str, value: Option<Option<String>>) {
        let i = self.attrs.iter().position(|(n, _)| n == name);
        match (i, value) {
            (Some(i), Some(value)) => self.attrs[i].1 = value,
            (None, Some(value)) => self.attrs.push((name.to_owned(), value)),
            (Some(i), None) => {
                self.attrs.remove(i);
            }
            (None, None) => {}
        }
    }

    /// The concatenated text content of the element.
    pub fn text(&self) -> String {
        let mut s = String::new();
        walk(&self.children, &mut |node| match node {
            Node::Text(t) | Node::Html(t) => s.push_str(t),
            _ => {}
        });
        s
    }
}

/// Visits every node depth first, blocks are transparent.
pub(crate) fn walk<'a, F>(nodes: &'a [Node], f: &mut F)
where
    F: FnMut(&'a Node),
{
    for node in nodes {
        f(node);
        match node {
            Node::Element(el) => walk(&el.children, f),
            Node::Block(block) => walk(&block.children, f),
            Node::Text(_) | Node::Html(_) => {}
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_nodes(&self.nodes, f)
    }
}

fn fmt_nodes(nodes: &[Node], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for node in nodes {
        match node {
            Node::Element(el) => fmt_element(el, f)?,
            Node::Text(text) => fmt_escaped(text, f)?,
            Node::Html(html) => f.write_str(html)?,
            Node::Block(block) => fmt_nodes(&block.children, f)?,
        }
    }
    Ok(())
}

fn fmt_element(el: &Element, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{}", el.tag)?;
    for (name, value) in &el.attrs {
        write!(f, " {name}")?;
        if let Some(value) = value {
            f.write_str("=\"")?;
            fmt_escaped(value, f)?;
            f.write_str("\"")?;
        }
    }
    for binding in &el.events {
        write!(f, " on{}=\"", binding.event)?;
        fmt_escaped(&binding.handler.to_string(), f)?;
        f.write_str("\"")?;
    }
    f.write_str(">")?;
    if tag::is_void(&el.tag) {
        return Ok(());
    }
    fmt_nodes(&el.children, f)?;
    write!(f, "</{}>", el.tag)
}

fn fmt_escaped(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut last = 0;
    for (i, c) in s.char_indices() {
        let escaped = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&#39;",
            _ => continue,
        };
        f.write_str(&s[last..i])?;
        f.write_str(escaped)?;
        last = i + 1;
    }
    f.write_str(&s[last..])
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::handlers::HandlerRegistry;

    fn element(tag: &str, children: Vec<Node>) -> Element {
        let mut el = Element::new(tag, None);
        el.children = children;
        el
    }

    #[test]
    fn fragment_to_html_escapes_text_and_attributes() {
        let mut el = element("p", vec![Node::Text("a < b & 'c'".into())]);
        el.attrs.push(("title".into(), Some("\"x\"".into())));
        el.attrs.push(("hidden".into(), None));
        let fragment = Fragment::new(vec![Node::Element(el), Node::Html("<br>".into())]);
        assert_eq!(
            fragment.to_html(),
            r#"<p title="&quot;x&quot;" hidden>a &lt; b &amp; &#39;c&#39;</p><br>"#
        );
    }

    #[test]
    fn fragment_to_html_void_and_blocks() {
        let block = Block {
            action: ActionId(0),
            children: vec![Node::Element(element("input", vec![]))],
            range: (0, 1),
            scope: Scope::default(),
        };
        let fragment = Fragment::new(vec![Node::Block(block)]);
        assert_eq!(fragment.to_html(), "<input>");
        assert_eq!(fragment.blocks(ActionId(0)).len(), 1);
    }

    #[test]
    fn fragment_to_html_events() {
        let mut registry = HandlerRegistry::new();
        registry.register(());
        registry.register(());
        let token = registry.register(());

        let mut el = element("button", vec![Node::Html("x".into())]);
        el.events.push(EventBinding {
            event: "click".into(),
            handler: Handler::Inline(r#"this.say("hi")"#.into()),
        });
        el.events.push(EventBinding {
            event: "input".into(),
            handler: Handler::Token(token),
        });
        let fragment = Fragment::new(vec![Node::Element(el)]);
        assert_eq!(
            fragment.to_html(),
            r#"<button onclick="this.say(&quot;hi&quot;)" oninput="handlers.invoke(3, event)">x</button>"#
        );
        assert_eq!(fragment.events().len(), 2);
    }

    #[test]
    fn fragment_preserved_keys() {
        let slot = Element::new("slot", Some("slot:default".into()));
        let mut li = Element::new("li", Some("a".into()));
        li.children.push(Node::Element(slot));
        let fragment = Fragment::new(vec![Node::Element(li)]);
        assert_eq!(fragment.preserved_keys(), ["a", "slot:default"]);
    }

    #[test]
    fn element_set_attr_keeps_position() {
        let mut el = Element::new("a", None);
        el.set_attr("href", Some(Some("/".into())));
        el.set_attr("class", Some(None));
        el.set_attr("href", Some(Some("/x".into())));
        assert_eq!(el.attrs[0], ("href".into(), Some("/x".into())));
        el.set_attr("href", None);
        assert_eq!(el.attr("href"), None);
        assert_eq!(el.attr("class"), Some(None));
    }
}
