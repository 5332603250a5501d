//! Owned HTML fragment tree
//!
//! `scraper` parses with html5ever into an immutable tree; rewriting passes
//! need to edit attributes and swap elements, so the `<body>` subtree is
//! copied into this small owned model and serialized back afterwards.
//! Attributes live in a `BTreeMap`, giving a stable output order.

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};
use std::collections::BTreeMap;

/// Elements that carry no readable content offline
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "link", "meta", "base", "title",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text children are serialized without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Fragment>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Fragment::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// First descendant element with the given name, depth-first
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| match child {
            Fragment::Element(el) if el.name == name => Some(el),
            Fragment::Element(el) => el.find_descendant(name),
            Fragment::Text(_) => None,
        })
    }
}

/// Parse a page and copy the children of its `<body>`
pub(crate) fn parse_body(html: &str) -> Vec<Fragment> {
    let document = Html::parse_document(html);
    let body = document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body");

    match body {
        Some(body) => convert_children(*body),
        None => Vec::new(),
    }
}

fn convert_children(node: NodeRef<Node>) -> Vec<Fragment> {
    node.children().filter_map(convert).collect()
}

fn convert(node: NodeRef<Node>) -> Option<Fragment> {
    match node.value() {
        Node::Text(text) => Some(Fragment::Text(text.to_string())),
        Node::Element(elem) => {
            let name = elem.name();
            if DROPPED_ELEMENTS.contains(&name) {
                return None;
            }
            // `<plaintext>` has no end tag; its text is kept as escaped `<pre>`
            let name = if name == "plaintext" { "pre" } else { name };
            Some(Fragment::Element(Element {
                name: name.to_string(),
                attrs: elem
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                children: convert_children(node),
            }))
        }
        // comments, doctypes, processing instructions
        _ => None,
    }
}

/// Serialize a fragment list as HTML, trimming surrounding whitespace
pub(crate) fn serialize(nodes: &[Fragment]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node, false);
    }
    out.trim().to_string()
}

fn write_node(out: &mut String, node: &Fragment, raw_text: bool) {
    match node {
        Fragment::Text(text) if raw_text => out.push_str(text),
        Fragment::Text(text) => escape_text(out, text),
        Fragment::Element(el) => write_element(out, el),
    }
}

fn write_element(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(out, value);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&el.name.as_str()) {
        return;
    }

    // The parser swallows one newline directly after these start tags
    if matches!(el.name.as_str(), "pre" | "textarea" | "listing") {
        if let Some(Fragment::Text(text)) = el.children.first() {
            if text.starts_with('\n') {
                out.push('\n');
            }
        }
    }

    let raw_text = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
    for child in &el.children {
        write_node(out, child, raw_text);
    }

    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(html: &str) -> String {
        serialize(&parse_body(html))
    }

    #[test]
    fn test_body_only_and_dropped_elements() {
        let html = r#"<html><head><title>T</title><style>p{}</style></head>
            <body><!-- note --><p>Hi<script>alert(1)</script></p></body></html>"#;
        assert_eq!(roundtrip(html), "<p>Hi</p>");
    }

    #[test]
    fn test_attributes_sorted_and_escaped() {
        let html = r#"<div title="a &quot;b&quot;" class="x">1 &lt; 2 &amp; 3</div>"#;
        assert_eq!(
            roundtrip(html),
            r#"<div class="x" title="a &quot;b&quot;">1 &lt; 2 &amp; 3</div>"#
        );
    }

    #[test]
    fn test_void_elements_and_pre_newline() {
        assert_eq!(roundtrip("<p>a<br>b</p>"), "<p>a<br>b</p>");
        let once = roundtrip("<pre>\n\nindented</pre>");
        assert_eq!(once, "<pre>\n\nindented</pre>");
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn test_plaintext_written_as_pre() {
        let once = roundtrip("<plaintext>a</plaintext><p>b</p>");
        assert_eq!(once, "<pre>a&lt;/plaintext&gt;&lt;p&gt;b&lt;/p&gt;</pre>");
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn test_find_descendant() {
        let nodes = parse_body(r#"<picture><source srcset="a.webp"><img alt="Cat"></picture>"#);
        let Fragment::Element(picture) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(picture.find_descendant("img").and_then(|i| i.attr("alt")), Some("Cat"));
    }
}
