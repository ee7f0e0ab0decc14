//! Element nodes.
//!
//! A [`Tag`] is a mutable tree node: a name, insertion-ordered attributes,
//! and an ordered list of [`Node`] children. Tags built by a renderer also
//! carry their [`TagKind`] and a shared [`TagContext`] (asset URLs and error
//! decorator), which is what makes URL-bearing attributes special.
//!
//! ## Asset URL attributes
//!
//! Setting one of the kind's URL attributes (`src` on `<img>`, `href` on a
//! stylesheet `<link>`) marks the value *pending*. Pending values are
//! resolved through [`AssetUrls::absolute_asset_url`] as soon as the kind's
//! rewrite predicate holds:
//!
//! ```text
//! link.attr("href", "site.css")      pending: [href]   (no rel yet)
//!     .attr("rel", "stylesheet")     href → /static/site.css?ver=3, pending: []
//!     .attr("title", "main")         nothing to do; href is not resolved twice
//! ```
//!
//! [`Tag::raw_attr`] bypasses all of this and stores the value verbatim.

use crate::assets::AssetUrls;
use crate::schema::{TagKind, TagSpec};
use crate::serialize::Method;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Insertion-ordered attribute map.
pub type Attributes = IndexMap<String, String>;

/// A child of a [`Tag`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Tag),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Node::Comment(text.into())
    }

    pub fn as_element(&self) -> Option<&Tag> {
        match self {
            Node::Element(tag) => Some(tag),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    pub fn into_element(self) -> Option<Tag> {
        match self {
            Node::Element(tag) => Some(tag),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }
}

impl From<Tag> for Node {
    fn from(tag: Tag) -> Self {
        Node::Element(tag)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

/// Marks a tag as erroneous, e.g. a form field that failed validation.
///
/// Any `Fn(Tag, &str, &str) -> Tag` closure is a decorator.
pub trait ErrorDecorator {
    fn decorate(&self, tag: Tag, message: &str, classes: &str) -> Tag;
}

impl<F> ErrorDecorator for F
where
    F: Fn(Tag, &str, &str) -> Tag,
{
    fn decorate(&self, tag: Tag, message: &str, classes: &str) -> Tag {
        self(tag, message, classes)
    }
}

/// State shared by every tag a renderer builds.
#[derive(Default)]
pub struct TagContext {
    urls: AssetUrls,
    decorator: Option<Rc<dyn ErrorDecorator>>,
}

impl TagContext {
    pub fn new(urls: AssetUrls) -> Self {
        Self {
            urls,
            decorator: None,
        }
    }

    pub fn with_decorator(mut self, decorator: Rc<dyn ErrorDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    pub fn urls(&self) -> &AssetUrls {
        &self.urls
    }

    pub(crate) fn decorator(&self) -> Option<&Rc<dyn ErrorDecorator>> {
        self.decorator.as_ref()
    }
}

impl fmt::Debug for TagContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagContext")
            .field("urls", &self.urls)
            .field("has_decorator", &self.decorator.is_some())
            .finish()
    }
}

/// An element node.
#[derive(Clone)]
pub struct Tag {
    name: String,
    attributes: Attributes,
    children: Vec<Node>,
    kind: TagKind,
    method: Method,
    spec: Option<&'static TagSpec>,
    context: Option<Rc<TagContext>>,
    /// URL attributes set but not yet resolved.
    pending: Vec<String>,
}

impl Tag {
    /// A free-standing tag: no URL rewriting, HTML serialization.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
            kind: TagKind::Plain,
            method: Method::Html,
            spec: None,
            context: None,
            pending: Vec::new(),
        }
    }

    pub(crate) fn from_spec(spec: &'static TagSpec, method: Method, context: Rc<TagContext>) -> Self {
        Self {
            kind: spec.kind(),
            method,
            spec: Some(spec),
            context: Some(context),
            ..Self::new(spec.name())
        }
    }

    pub(crate) fn bound(name: impl Into<String>, method: Method, context: Rc<TagContext>) -> Self {
        Self {
            method,
            context: Some(context),
            ..Self::new(name)
        }
    }

    // =========================================================================
    // Builder API
    // =========================================================================

    /// Set an attribute, with asset URL handling. See the module docs.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set an attribute verbatim.
    pub fn raw_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_raw_attribute(name, value);
        self
    }

    pub fn attrs<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in attributes {
            self.set_attribute(name, value);
        }
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.push(child);
        self
    }

    pub fn children<N: Into<Node>>(mut self, children: impl IntoIterator<Item = N>) -> Self {
        self.extend(children);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();

        if let Some(spec) = self.spec {
            if !spec.allows(&name) {
                log::debug!("<{}> does not declare attribute {name:?}", self.name);
            }
        }

        let is_url = self.kind.url_attributes().contains(&name.as_str());
        if is_url && !self.pending.contains(&name) {
            self.pending.push(name.clone());
        }
        self.attributes.insert(name, value.into());
        self.resolve_pending();
    }

    pub fn set_raw_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.pending.retain(|pending| *pending != name);
        self.attributes.insert(name, value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.pending.retain(|pending| pending != name);
        self.attributes.shift_remove(name)
    }

    pub fn push(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    pub fn extend<N: Into<Node>>(&mut self, children: impl IntoIterator<Item = N>) {
        self.children.extend(children.into_iter().map(Into::into));
    }

    fn resolve_pending(&mut self) {
        if self.pending.is_empty() || !self.kind.rewrites(&self.attributes) {
            return;
        }
        let urls = self.context.as_deref().map(TagContext::urls);
        for name in std::mem::take(&mut self.pending) {
            if let (Some(value), Some(urls)) = (self.attributes.get_mut(&name), urls) {
                *value = urls.absolute_asset_url(value);
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn spec(&self) -> Option<&'static TagSpec> {
        self.spec
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.children
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Tag> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of this tag and its descendants.
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> Option<&Rc<TagContext>> {
        self.context.as_ref()
    }

    // =========================================================================
    // Classes
    // =========================================================================

    pub fn classes(&self) -> Vec<&str> {
        self.get("class")
            .map(|class| class.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes = self.classes();
        classes.push(class);
        let value = classes.join(" ");
        self.attributes.insert("class".to_string(), value);
    }

    /// Remove `class`; the attribute goes away with the last class.
    pub fn remove_class(&mut self, class: &str) {
        let remaining: Vec<&str> = self.classes().into_iter().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.attributes.shift_remove("class");
        } else {
            let value = remaining.join(" ");
            self.attributes.insert("class".to_string(), value);
        }
    }

    /// Hand the tag to the context's error decorator; unchanged without one.
    pub fn mark_error(self, message: &str, classes: &str) -> Tag {
        match self.context.as_ref().and_then(|ctx| ctx.decorator()).cloned() {
            Some(decorator) => decorator.decorate(self, message, classes),
            None => self,
        }
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(tag) => collect_text(&tag.children, out),
            Node::Comment(_) => {}
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
            && self.kind == other.kind
            && self.method == other.method
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("children", &self.children)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HEAD, HTML4};
    use crate::test_helpers::context;

    fn build(name: &str, ctx: &Rc<TagContext>) -> Tag {
        let spec = HTML4.get(name).or_else(|| HEAD.get(name)).unwrap();
        Tag::from_spec(spec, Method::Html, Rc::clone(ctx))
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let tag = Tag::new("p").attr("b", "2").attr("a", "1").attr("b", "3");
        let names: Vec<_> = tag.attributes().keys().map(String::as_str).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(tag.get("b"), Some("3"));
    }

    #[test]
    fn img_src_and_lowsrc_are_resolved() {
        let ctx = context(Some("/static"), Some("7"));
        let img = build("img", &ctx).attr("src", "a.png").attr("lowsrc", "a-low.png");
        assert_eq!(img.get("src"), Some("/static/a.png?ver=7"));
        assert_eq!(img.get("lowsrc"), Some("/static/a-low.png?ver=7"));
    }

    #[test]
    fn absolute_src_keeps_path_and_skips_version() {
        let ctx = context(Some("/static"), Some("7"));
        let script = build("script", &ctx).attr("src", "/js/app.js");
        assert_eq!(script.get("src"), Some("/js/app.js"));
    }

    #[test]
    fn navigational_link_keeps_raw_href() {
        let ctx = context(Some("/static"), None);
        let link = build("link", &ctx).attr("rel", "next").attr("href", "abc");
        assert_eq!(link.get("href"), Some("abc"));
    }

    #[test]
    fn stylesheet_link_href_is_resolved_whatever_the_order() {
        let ctx = context(Some("/static"), None);
        let before = build("link", &ctx).attr("rel", "stylesheet").attr("href", "abc");
        let after = build("link", &ctx).attr("href", "abc").attr("rel", "stylesheet");
        assert_eq!(before.get("href"), Some("/static/abc"));
        assert_eq!(after.get("href"), Some("/static/abc"));
    }

    #[test]
    fn resolved_url_is_not_resolved_again() {
        let ctx = context(None, Some("1.2"));
        let link = build("link", &ctx)
            .attr("href", "abc")
            .attr("rel", "stylesheet")
            .attr("rel", "icon");
        assert_eq!(link.get("href"), Some("abc?ver=1.2"));
    }

    #[test]
    fn anchors_are_not_rewritten() {
        let ctx = context(Some("/static"), Some("1"));
        let a = build("a", &ctx).attr("href", "page.html");
        assert_eq!(a.get("href"), Some("page.html"));
    }

    #[test]
    fn raw_attr_bypasses_resolution() {
        let ctx = context(Some("/static"), None);
        let img = build("img", &ctx).raw_attr("src", "a.png");
        assert_eq!(img.get("src"), Some("a.png"));
    }

    #[test]
    fn removing_a_pending_attribute_forgets_it() {
        let ctx = context(Some("/static"), None);
        let mut link = build("link", &ctx).attr("href", "abc");
        assert_eq!(link.remove_attribute("href").as_deref(), Some("abc"));
        link.set_attribute("rel", "stylesheet");
        assert_eq!(link.get("href"), None);
    }

    #[test]
    fn free_tags_store_urls_verbatim() {
        let img = Tag::new("img").attr("src", "a.png");
        assert_eq!(img.get("src"), Some("a.png"));
    }

    #[test]
    fn class_helpers() {
        let mut tag = Tag::new("div").attr("class", "a  b");
        assert_eq!(tag.classes(), ["a", "b"]);
        tag.add_class("c");
        tag.add_class("a");
        assert_eq!(tag.get("class"), Some("a b c"));
        assert!(tag.has_class("c"));
        tag.remove_class("a");
        tag.remove_class("b");
        assert_eq!(tag.get("class"), Some("c"));
        tag.remove_class("c");
        assert_eq!(tag.get("class"), None);
    }

    #[test]
    fn text_collects_descendants_and_skips_comments() {
        let tag = Tag::new("p")
            .child("Hello ")
            .child(Node::comment("ignored"))
            .child(Tag::new("b").child("world"));
        assert_eq!(tag.text(), "Hello world");
        assert_eq!(tag.elements().count(), 1);
    }

    #[test]
    fn mark_error_is_identity_without_decorator() {
        let ctx = context(None, None);
        let input = build("input", &ctx).attr("name", "age");
        assert_eq!(input.clone().mark_error("required", "err"), input);
    }

    #[test]
    fn mark_error_uses_the_decorator() {
        let decorator = |mut tag: Tag, message: &str, classes: &str| {
            tag.add_class(classes);
            tag.set_attribute("title", message);
            tag
        };
        let ctx = Rc::new(TagContext::default().with_decorator(Rc::new(decorator)));
        let input = build("input", &ctx).mark_error("required", "invalid");
        assert!(input.has_class("invalid"));
        assert_eq!(input.get("title"), Some("required"));
    }

    #[test]
    fn equality_ignores_context() {
        let ctx = context(Some("/x"), None);
        let bound = Tag::bound("p", Method::Html, ctx).child("a");
        assert_eq!(bound, Tag::new("p").child("a"));
    }
}
