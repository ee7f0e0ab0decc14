//! Markup serialization.
//!
//! Two output methods:
//!
//! | Method | Empty element | `<script>`/`<style>` text |
//! |--------|---------------|---------------------------|
//! | [`Method::Html`] | `<p></p>`, void elements as `<br>` | written raw |
//! | [`Method::Xml`] | `<p/>` | escaped |
//!
//! Text and attribute values are escaped with [`maud::Escaper`], the same
//! escaping `maud::html!` templates use, so a [`Tag`] embedded in a template
//! through its [`maud::Render`] impl reads the same as one serialized on its
//! own.
//!
//! With `pipeline: false`, template bookkeeping attributes (`tpl:*`) are
//! dropped from the output.

use crate::tag::{Node, Tag};
use maud::Escaper;
use std::fmt::{self, Write};

/// Prefix of template bookkeeping attributes.
pub const TEMPLATE_ID_PREFIX: &str = "tpl:";

/// Elements written without a closing tag when empty in HTML output.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

/// Elements whose text content is not escaped in HTML output.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Html,
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Output method; `None` uses the tag's own.
    pub method: Option<Method>,
    /// Keep `tpl:*` attributes.
    pub pipeline: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            method: None,
            pipeline: true,
        }
    }
}

impl SerializeOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn without_pipeline(mut self) -> Self {
        self.pipeline = false;
        self
    }
}

impl Tag {
    pub fn serialize(&self, options: &SerializeOptions) -> String {
        let mut out = String::new();
        let method = options.method.unwrap_or(self.method());
        write_tag(self, method, options.pipeline, &mut out);
        out
    }

    /// UTF-8 encoded [`Tag::serialize`].
    pub fn to_bytes(&self, options: &SerializeOptions) -> Vec<u8> {
        self.serialize(options).into_bytes()
    }
}

/// Serialize a sequence of sibling nodes, e.g. a parsed fragment.
pub fn serialize_nodes(nodes: &[Node], method: Method, pipeline: bool) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, method, pipeline, false, &mut out);
    }
    out
}

fn write_node(node: &Node, method: Method, pipeline: bool, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(tag) => write_tag(tag, method, pipeline, out),
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape(text, out),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn write_tag(tag: &Tag, method: Method, pipeline: bool, out: &mut String) {
    let name = tag.name();

    out.push('<');
    out.push_str(name);
    for (attr, value) in tag.attributes() {
        if !pipeline && attr.starts_with(TEMPLATE_ID_PREFIX) {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape(value, out);
        out.push('"');
    }

    if tag.nodes().is_empty() {
        match method {
            Method::Xml => {
                out.push_str("/>");
                return;
            }
            Method::Html if VOID_ELEMENTS.contains(&name) => {
                out.push('>');
                return;
            }
            Method::Html => {}
        }
    }
    out.push('>');

    let raw_text = method == Method::Html && RAW_TEXT_ELEMENTS.contains(&name);
    for child in tag.nodes() {
        write_node(child, method, pipeline, raw_text, out);
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape(text: &str, out: &mut String) {
    // Writing into a String cannot fail.
    let _ = Escaper::new(out).write_str(text);
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize(&SerializeOptions::default()))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_node(self, Method::Html, true, false, &mut out);
        f.write_str(&out)
    }
}

impl maud::Render for Tag {
    fn render_to(&self, buffer: &mut String) {
        write_tag(self, self.method(), true, buffer);
    }
}
