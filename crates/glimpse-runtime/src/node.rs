//! Rendered output tree.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Index of an event handler captured during a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub usize);

/// A rendered host element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Event prop name (`onClick`) to handler
    pub handlers: BTreeMap<String, HandlerId>,
    pub children: Vec<Node>,
}

/// One node of rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(ElementNode),
    Text(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl Node {
    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            Node::Element(el) => el.children.iter().map(Node::text_content).collect(),
        }
    }

    /// Serialize as HTML-like markup.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self);
        out
    }
}

/// Serialize a rendered tree.
pub fn to_markup(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

/// Concatenated text of a rendered tree.
pub fn text_content(nodes: &[Node]) -> String {
    nodes.iter().map(Node::text_content).collect()
}

/// First handler bound to `event` in document order.
pub fn find_handler(nodes: &[Node], event: &str) -> Option<HandlerId> {
    nodes.iter().find_map(|node| match node {
        Node::Text(_) => None,
        Node::Element(el) => el
            .handlers
            .get(event)
            .copied()
            .or_else(|| find_handler(&el.children, event)),
    })
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => out.push_str(&escape_html(text)),
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attributes {
                let name = match name.as_str() {
                    "className" => "class",
                    "htmlFor" => "for",
                    other => other,
                };
                if value.is_empty() {
                    let _ = write!(out, " {name}");
                } else {
                    let _ = write!(out, " {name}=\"{}\"", escape_html(value));
                }
            }

            if VOID_ELEMENTS.contains(&el.tag.as_str()) && el.children.is_empty() {
                out.push_str(" />");
                return;
            }

            out.push('>');
            for child in &el.children {
                write_node(out, child);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
