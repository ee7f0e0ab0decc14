//! Open/close accumulator behind the renderers' nested building.
//!
//! Nodes pushed while a tag is open become its children; with nothing open
//! they become roots. Closing a tag pushes it into whatever is open below it.
//!
//! ```text
//! open(div)           stack: [div]
//!   push("hi")        div: ["hi"]
//!   open(p)           stack: [div, p]
//!   close()           div: ["hi", <p>]
//! close()             roots: [<div>]
//! ```

use crate::tag::{Node, Tag};

#[derive(Debug, Default, Clone)]
pub struct Builder {
    roots: Vec<Node>,
    open: Vec<Tag>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        match self.open.last_mut() {
            Some(parent) => parent.push(node),
            None => self.roots.push(node.into()),
        }
    }

    /// Push text, appending to the previous node when it is text too.
    pub fn push_text(&mut self, text: &str) {
        let siblings = match self.open.last_mut() {
            Some(parent) => parent.nodes_mut(),
            None => &mut self.roots,
        };
        match siblings.last_mut() {
            Some(Node::Text(previous)) => previous.push_str(text),
            _ => siblings.push(Node::text(text)),
        }
    }

    pub fn open(&mut self, tag: Tag) {
        self.open.push(tag);
    }

    /// Close the innermost open tag. Returns `false` when nothing was open.
    pub fn close(&mut self) -> bool {
        match self.open.pop() {
            Some(tag) => {
                self.push(tag);
                true
            }
            None => false,
        }
    }

    /// Number of tags currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Completed top-level nodes; still-open tags are not included.
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// The single root element, if exactly one node was built and it is an element.
    pub fn root(&self) -> Option<&Tag> {
        match self.roots.as_slice() {
            [node] => node.as_element(),
            _ => None,
        }
    }

    /// Close everything still open and hand over the roots.
    pub fn take_roots(&mut self) -> Vec<Node> {
        while self.close() {}
        std::mem::take(&mut self.roots)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.open.is_empty()
    }
}
