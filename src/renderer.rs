//! Document renderer: the element factory for a whole page.
//!
//! A [`Renderer`] builds tags from its [`Dialect`]'s schema, accumulates the
//! page body, and owns (or shares) the page's [`HeadRenderer`]:
//!
//! ```text
//! Renderer (html5)                     child renderer (component)
//! ├── builder: body roots              ├── builder: its own roots
//! ├── context: urls + error decorator ─┤   (same context)
//! └── head: Rc<HeadRenderer> ──────────┘   (same head)
//! ```
//!
//! Components render through [`Renderer::child`], so everything they
//! register lands in the one head of the page. [`Renderer::page`] then
//! stitches `html(head, body)` together with the head's top and bottom
//! resources.
//!
//! Asking for a tag the dialect does not have fails with
//! [`RenderError::NoSuchMember`], whether the tag was never defined or is
//! obsolete in the dialect (`center` in HTML5).

use crate::assets::AssetUrls;
use crate::builder::Builder;
use crate::config::{ConfigError, RendererConfig};
use crate::head::HeadRenderer;
use crate::parse::{self, ParseError, ParseOptions, Parsed};
use crate::schema::{self, Lookup, Schema};
use crate::serialize::{Method, SerializeOptions};
use crate::tag::{ErrorDecorator, Node, Tag, TagContext};
use crate::url::UrlParams;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("'{owner}' object has no attribute '{name}'")]
    NoSuchMember { owner: &'static str, name: String },
}

/// HTML flavour of a renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Html4,
    #[default]
    Html5,
}

impl Dialect {
    pub fn doctype(self) -> &'static str {
        match self {
            Dialect::Html4 => {
                r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#
            }
            Dialect::Html5 => "<!DOCTYPE html>",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            Dialect::Html4 => &*schema::HTML4,
            Dialect::Html5 => &*schema::HTML5,
        }
    }
}

/// Full-page renderer.
#[derive(Debug)]
pub struct Renderer {
    dialect: Dialect,
    head: Rc<HeadRenderer>,
    context: Rc<TagContext>,
    builder: Builder,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Dialect::default(), AssetUrls::default())
    }
}

impl Renderer {
    const OWNER: &'static str = "Renderer";

    /// A renderer with a fresh head.
    pub fn new(dialect: Dialect, urls: AssetUrls) -> Self {
        let context = Rc::new(TagContext::new(urls.clone()));
        Self {
            dialect,
            head: Rc::new(HeadRenderer::new(urls)),
            context,
            builder: Builder::new(),
        }
    }

    pub fn from_config(config: &RendererConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.dialect, config.asset_urls()?))
    }

    /// A renderer for a nested component: same head, same context, own roots.
    pub fn child(&self) -> Self {
        Self {
            dialect: self.dialect,
            head: Rc::clone(&self.head),
            context: Rc::clone(&self.context),
            builder: Builder::new(),
        }
    }

    /// Install the decorator used by [`Tag::mark_error`] on tags built from now on.
    ///
    /// The head renderer adopts it too; a child renderer shares that head, so
    /// the page's head tags follow the last decorator installed.
    pub fn with_error_decorator(mut self, decorator: Rc<dyn ErrorDecorator>) -> Self {
        let urls = self.context.urls().clone();
        self.head.set_error_decorator(Rc::clone(&decorator));
        self.context = Rc::new(TagContext::new(urls).with_decorator(decorator));
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn head(&self) -> &HeadRenderer {
        &self.head
    }

    pub fn urls(&self) -> &AssetUrls {
        self.head.urls()
    }

    pub fn content_type(&self) -> &'static str {
        "text/html"
    }

    // =========================================================================
    // Element factory
    // =========================================================================

    pub fn tag(&self, name: &str) -> Result<Tag, RenderError> {
        match self.dialect.schema().lookup(name) {
            Lookup::Found(spec) => Ok(Tag::from_spec(spec, Method::Html, Rc::clone(&self.context))),
            Lookup::NotFound | Lookup::Hidden => Err(RenderError::NoSuchMember {
                owner: Self::OWNER,
                name: name.to_string(),
            }),
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.dialect.schema().contains(name)
    }

    pub fn absolute_url(&self, url: &str, prefix: Option<&str>) -> String {
        self.head.absolute_url(url, prefix)
    }

    pub fn absolute_asset_url(&self, url: &str) -> String {
        self.head.absolute_asset_url(url)
    }

    pub fn absolute_asset_url_with(
        &self,
        url: &str,
        prefix: Option<&str>,
        always_relative: bool,
        params: UrlParams,
    ) -> String {
        self.head.absolute_asset_url_with(url, prefix, always_relative, params)
    }

    // =========================================================================
    // Building
    // =========================================================================

    pub fn push(&mut self, node: impl Into<Node>) {
        self.builder.push(node);
    }

    /// Open `tag`, run `build` with it as the insertion point, then close it.
    pub fn with(&mut self, tag: Tag, build: impl FnOnce(&mut Self)) {
        self.builder.open(tag);
        build(self);
        self.builder.close();
    }

    pub fn roots(&self) -> &[Node] {
        self.builder.roots()
    }

    /// The single root element built so far, if there is exactly one.
    pub fn root(&self) -> Option<&Tag> {
        self.builder.root()
    }

    pub fn take_roots(&mut self) -> Vec<Node> {
        self.builder.take_roots()
    }

    pub fn parse_str(&self, text: &str, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_str(text, options, &self.context)
    }

    pub fn parse_bytes(&self, bytes: &[u8], options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_bytes(bytes, options, &self.context)
    }

    pub fn parse_reader(&self, source: impl Read, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_reader(source, options, &self.context)
    }

    pub fn parse_file(&self, path: &Path, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_file(path, options, &self.context)
    }

    // =========================================================================
    // Page assembly
    // =========================================================================

    /// Take the built roots and assemble the `<html>` element.
    ///
    /// A single `<body>` root is reused; anything else becomes the content
    /// of a new one. Bottom resources are appended to the body.
    pub fn page(&mut self) -> Tag {
        let roots = self.builder.take_roots();
        let mut body = match <[Node; 1]>::try_from(roots) {
            Ok([Node::Element(tag)]) if tag.name() == "body" => tag,
            Ok(single) => self.make("body").children(single),
            Err(roots) => self.make("body").children(roots),
        };
        body.extend(self.head.render_bottom());

        self.make("html").child(self.head.render_top()).child(body)
    }

    /// [`Renderer::page`] serialized, with the dialect's doctype.
    pub fn render_page(&mut self) -> String {
        let page = self.page();
        format!(
            "{}\n{}",
            self.dialect.doctype(),
            page.serialize(&SerializeOptions::default())
        )
    }

    fn make(&self, name: &'static str) -> Tag {
        match self.tag(name) {
            Ok(tag) => tag,
            Err(_) => Tag::bound(name, Method::Html, Rc::clone(&self.context)),
        }
    }
}
