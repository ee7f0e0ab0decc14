//! Shared test utilities for the tagtree test suite.
//!
//! Builds renderers and contexts from the two asset settings most tests
//! vary (static prefix and assets version), and flattens tag lists to
//! markup for comparisons.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let h = html5(Some("/static"), Some("1.2"));
//! let img = h.tag("img").unwrap().attr("src", "a.png");
//! assert_eq!(img.get("src"), Some("/static/a.png?ver=1.2"));
//! ```

use std::rc::Rc;

use crate::assets::AssetUrls;
use crate::head::HeadRenderer;
use crate::renderer::{Dialect, Renderer};
use crate::tag::{Tag, TagContext};

fn urls(static_url: Option<&str>, version: Option<&str>) -> AssetUrls {
    AssetUrls::new(static_url.map(str::to_string), version.map(str::to_string))
}

/// A tag context without error decorator.
pub fn context(static_url: Option<&str>, version: Option<&str>) -> Rc<TagContext> {
    Rc::new(TagContext::new(urls(static_url, version)))
}

pub fn head(static_url: Option<&str>, version: Option<&str>) -> HeadRenderer {
    HeadRenderer::new(urls(static_url, version))
}

pub fn html4(static_url: Option<&str>, version: Option<&str>) -> Renderer {
    Renderer::new(Dialect::Html4, urls(static_url, version))
}

pub fn html5(static_url: Option<&str>, version: Option<&str>) -> Renderer {
    Renderer::new(Dialect::Html5, urls(static_url, version))
}

/// Concatenated markup of `tags`.
pub fn render_all(tags: &[Tag]) -> String {
    tags.iter().map(Tag::to_string).collect()
}
