//! The `<head>` aggregator.
//!
//! Components rendered anywhere in a page register the stylesheets and
//! scripts they need; the [`HeadRenderer`] keeps one ordered registry per
//! resource class and emits them once, where they belong:
//!
//! ```text
//! registry      key                    rendered as
//! ───────────   ────────────────────   ─────────────────────────────────────────────
//! css_urls      resolved asset URL     <link rel="stylesheet" type="text/css" href>
//! js_urls       resolved asset URL     <script type="text/javascript" src>
//! css           caller id              <style type="text/css" data-head-css=id>
//! js            caller id              <script type="text/javascript" data-head-js=id>
//! ```
//!
//! [`HeadRenderer::render_top`] builds the `<head>` element from the entries
//! registered without `bottom`, in the table's order; [`HeadRenderer::render_bottom`]
//! returns the `bottom` entries for the end of `<body>`.
//!
//! ## Deduplication
//!
//! The first registration of a key wins: registering the same id or URL again
//! is a no-op, even with different content or attributes. URL keys are the
//! *resolved* URLs, so `site.css` and `/static/site.css` registered through a
//! `/static` prefix are the same entry.
//!
//! ## Sharing
//!
//! One head serves a whole page. Renderers hold it in an `Rc` and every
//! method takes `&self`; registries live behind `RefCell`s.

use crate::assets::AssetUrls;
use crate::builder::Builder;
use crate::parse::{self, ParseError, ParseOptions, Parsed};
use crate::renderer::RenderError;
use crate::schema::{HEAD, Lookup};
use crate::serialize::Method;
use crate::tag::{Attributes, ErrorDecorator, Node, Tag, TagContext};
use crate::url::UrlParams;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

/// Data attribute naming an inline stylesheet.
pub const CSS_ID_ATTRIBUTE: &str = "data-head-css";
/// Data attribute naming an inline script.
pub const JS_ID_ATTRIBUTE: &str = "data-head-js";

/// Options of a resource registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Emit at the end of `<body>` instead of in `<head>`.
    pub bottom: bool,
    /// Extra query parameters for URL resources.
    pub url_params: UrlParams,
    /// Extra attributes of the generated element.
    pub attributes: Attributes,
}

impl ResourceOptions {
    pub fn bottom() -> Self {
        Self {
            bottom: true,
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key, value);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A registered inline stylesheet or script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResource {
    pub content: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub bottom: bool,
}

/// A registered stylesheet or script URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlResource {
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub bottom: bool,
}

/// Snapshot of every registry, in registration order.
///
/// A component can record what it registered and replay it later with
/// [`HeadRenderer::merge_manifest`], e.g. when its markup comes from a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadManifest {
    pub css_urls: IndexMap<String, UrlResource>,
    pub js_urls: IndexMap<String, UrlResource>,
    pub css: IndexMap<String, InlineResource>,
    pub js: IndexMap<String, InlineResource>,
}

impl HeadManifest {
    pub fn is_empty(&self) -> bool {
        self.css_urls.is_empty() && self.js_urls.is_empty() && self.css.is_empty() && self.js.is_empty()
    }

    pub fn len(&self) -> usize {
        self.css_urls.len() + self.js_urls.len() + self.css.len() + self.js.len()
    }

    /// Load a manifest saved next to cached markup. Returns an empty
    /// manifest if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("ignoring unreadable head manifest {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

/// Renderer of the `<head>` section and registry of page resources.
#[derive(Debug)]
pub struct HeadRenderer {
    urls: AssetUrls,
    /// Replaced when a renderer installs an error decorator.
    context: RefCell<Rc<TagContext>>,
    registry: RefCell<HeadManifest>,
    builder: RefCell<Builder>,
}

impl HeadRenderer {
    const OWNER: &'static str = "HeadRenderer";

    pub fn new(urls: AssetUrls) -> Self {
        Self {
            context: RefCell::new(Rc::new(TagContext::new(urls.clone()))),
            urls,
            registry: RefCell::new(HeadManifest::default()),
            builder: RefCell::new(Builder::new()),
        }
    }

    pub fn urls(&self) -> &AssetUrls {
        &self.urls
    }

    /// Decorate head tags built from now on with `decorator`.
    pub(crate) fn set_error_decorator(&self, decorator: Rc<dyn ErrorDecorator>) {
        let context = TagContext::new(self.urls.clone()).with_decorator(decorator);
        *self.context.borrow_mut() = Rc::new(context);
    }

    fn context(&self) -> Rc<TagContext> {
        Rc::clone(&self.context.borrow())
    }

    pub fn absolute_url(&self, url: &str, prefix: Option<&str>) -> String {
        self.urls().absolute_url(url, prefix)
    }

    pub fn absolute_asset_url(&self, url: &str) -> String {
        self.urls().absolute_asset_url(url)
    }

    pub fn absolute_asset_url_with(
        &self,
        url: &str,
        prefix: Option<&str>,
        always_relative: bool,
        params: UrlParams,
    ) -> String {
        self.urls().absolute_asset_url_with(url, prefix, always_relative, params)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an inline stylesheet under `id`. Returns whether it was new.
    pub fn register_css(&self, id: impl Into<String>, content: impl Into<String>, options: ResourceOptions) -> bool {
        let mut registry = self.registry.borrow_mut();
        register_inline(&mut registry.css, id.into(), content.into(), options, "css")
    }

    /// Register an inline script under `id`. Returns whether it was new.
    pub fn register_js(&self, id: impl Into<String>, content: impl Into<String>, options: ResourceOptions) -> bool {
        let mut registry = self.registry.borrow_mut();
        register_inline(&mut registry.js, id.into(), content.into(), options, "js")
    }

    /// Register a stylesheet URL, keyed by its resolved form. Returns whether it was new.
    pub fn register_css_url(&self, url: &str, options: ResourceOptions) -> bool {
        let resolved = self.resolve_resource_url(url, &options);
        let mut registry = self.registry.borrow_mut();
        register_url(&mut registry.css_urls, resolved, options, "css url")
    }

    /// Register a script URL, keyed by its resolved form. Returns whether it was new.
    pub fn register_js_url(&self, url: &str, options: ResourceOptions) -> bool {
        let resolved = self.resolve_resource_url(url, &options);
        let mut registry = self.registry.borrow_mut();
        register_url(&mut registry.js_urls, resolved, options, "js url")
    }

    fn resolve_resource_url(&self, url: &str, options: &ResourceOptions) -> String {
        self.urls()
            .absolute_asset_url_with(url, None, false, options.url_params.clone())
    }

    pub fn manifest(&self) -> HeadManifest {
        self.registry.borrow().clone()
    }

    /// Replay `manifest` with first-wins semantics. Returns the number of new entries.
    ///
    /// URL keys are taken as already resolved.
    pub fn merge_manifest(&self, manifest: &HeadManifest) -> usize {
        let mut registry = self.registry.borrow_mut();
        let mut added = 0;
        added += merge_entries(&mut registry.css_urls, &manifest.css_urls);
        added += merge_entries(&mut registry.js_urls, &manifest.js_urls);
        added += merge_entries(&mut registry.css, &manifest.css);
        added += merge_entries(&mut registry.js, &manifest.js);
        added
    }

    // =========================================================================
    // Element factory
    // =========================================================================

    /// Build a head tag (`base head link meta title style script`).
    pub fn tag(&self, name: &str) -> Result<Tag, RenderError> {
        match HEAD.lookup(name) {
            Lookup::Found(spec) => Ok(Tag::from_spec(spec, Method::Html, self.context())),
            Lookup::NotFound | Lookup::Hidden => Err(RenderError::NoSuchMember {
                owner: Self::OWNER,
                name: name.to_string(),
            }),
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        HEAD.contains(name)
    }

    /// Add head content, e.g. a `<title>` or `<meta>`.
    pub fn push(&self, node: impl Into<Node>) {
        self.builder.borrow_mut().push(node);
    }

    /// Open `tag`, run `build` with it as the insertion point, then close it.
    pub fn with(&self, tag: Tag, build: impl FnOnce(&Self)) {
        self.builder.borrow_mut().open(tag);
        build(self);
        self.builder.borrow_mut().close();
    }

    pub fn parse_str(&self, text: &str, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_str(text, options, &self.context())
    }

    pub fn parse_bytes(&self, bytes: &[u8], options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_bytes(bytes, options, &self.context())
    }

    pub fn parse_reader(&self, source: impl Read, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_reader(source, options, &self.context())
    }

    pub fn parse_file(&self, path: &Path, options: &ParseOptions) -> Result<Parsed, ParseError> {
        parse::parse_file(path, options, &self.context())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// The `<head>` element: pushed content plus every non-bottom resource.
    ///
    /// A single pushed `<head>` is reused with its attributes; anything else
    /// pushed becomes the children of a new one. Rendering does not consume
    /// anything and can be repeated.
    pub fn render_top(&self) -> Tag {
        let roots = self.builder.borrow().roots().to_vec();
        let mut head = match roots.as_slice() {
            [Node::Element(tag)] if tag.name() == "head" => tag.clone(),
            _ => self.make("head").children(roots),
        };
        head.extend(self.resources(false));
        head
    }

    /// The bottom resources, for the end of `<body>`.
    pub fn render_bottom(&self) -> Vec<Tag> {
        self.resources(true)
    }

    fn resources(&self, bottom: bool) -> Vec<Tag> {
        let registry = self.registry.borrow();
        let mut tags = Vec::new();

        for (url, resource) in registry.css_urls.iter().filter(|(_, r)| r.bottom == bottom) {
            tags.push(
                self.make("link")
                    .raw_attr("rel", "stylesheet")
                    .raw_attr("type", "text/css")
                    .raw_attr("href", url)
                    .attrs(resource.attributes.clone()),
            );
        }
        for (url, resource) in registry.js_urls.iter().filter(|(_, r)| r.bottom == bottom) {
            tags.push(
                self.make("script")
                    .raw_attr("type", "text/javascript")
                    .raw_attr("src", url)
                    .attrs(resource.attributes.clone()),
            );
        }
        for (id, resource) in registry.css.iter().filter(|(_, r)| r.bottom == bottom) {
            tags.push(
                self.make("style")
                    .raw_attr("type", "text/css")
                    .raw_attr(CSS_ID_ATTRIBUTE, id)
                    .attrs(resource.attributes.clone())
                    .child(resource.content.as_str()),
            );
        }
        for (id, resource) in registry.js.iter().filter(|(_, r)| r.bottom == bottom) {
            tags.push(
                self.make("script")
                    .raw_attr("type", "text/javascript")
                    .raw_attr(JS_ID_ATTRIBUTE, id)
                    .attrs(resource.attributes.clone())
                    .child(resource.content.as_str()),
            );
        }
        tags
    }

    fn make(&self, name: &'static str) -> Tag {
        match HEAD.get(name) {
            Some(spec) => Tag::from_spec(spec, Method::Html, self.context()),
            None => Tag::bound(name, Method::Html, self.context()),
        }
    }
}

fn register_inline(
    registry: &mut IndexMap<String, InlineResource>,
    id: String,
    content: String,
    options: ResourceOptions,
    class: &str,
) -> bool {
    match registry.entry(id) {
        Entry::Occupied(entry) => {
            log::debug!("{class} {:?} already registered; keeping the first", entry.key());
            false
        }
        Entry::Vacant(entry) => {
            entry.insert(InlineResource {
                content,
                attributes: options.attributes,
                bottom: options.bottom,
            });
            true
        }
    }
}

fn register_url(
    registry: &mut IndexMap<String, UrlResource>,
    url: String,
    options: ResourceOptions,
    class: &str,
) -> bool {
    match registry.entry(url) {
        Entry::Occupied(entry) => {
            log::debug!("{class} {:?} already registered; keeping the first", entry.key());
            false
        }
        Entry::Vacant(entry) => {
            entry.insert(UrlResource {
                attributes: options.attributes,
                bottom: options.bottom,
            });
            true
        }
    }
}

fn merge_entries<V: Clone>(registry: &mut IndexMap<String, V>, incoming: &IndexMap<String, V>) -> usize {
    let mut added = 0;
    for (key, value) in incoming {
        if !registry.contains_key(key) {
            registry.insert(key.clone(), value.clone());
            added += 1;
        }
    }
    added
}
