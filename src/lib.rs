//! # tagtree
//!
//! Build HTML and XML element trees in code, with asset URLs resolved as you
//! go and every page's stylesheets and scripts collected into one `<head>`.
//!
//! ```rust
//! use tagtree::assets::AssetUrls;
//! use tagtree::head::ResourceOptions;
//! use tagtree::renderer::{Dialect, Renderer};
//!
//! let urls = AssetUrls::default().with_static_url("/static").with_assets_version("3");
//! let mut h = Renderer::new(Dialect::Html5, urls);
//!
//! h.head().register_css_url("site.css", ResourceOptions::default());
//! let logo = h.tag("img").unwrap().attr("src", "logo.png").attr("alt", "Logo");
//! h.push(logo);
//!
//! assert_eq!(
//!     h.page().to_string(),
//!     concat!(
//!         r#"<html><head><link rel="stylesheet" type="text/css" href="/static/site.css?ver=3"></head>"#,
//!         r#"<body><img src="/static/logo.png?ver=3" alt="Logo"></body></html>"#,
//!     )
//! );
//! ```
//!
//! # Architecture: Renderers Over a Small Tree Engine
//!
//! ```text
//! url ──► assets ──► tag ◄── schema        element model
//!                     │
//!         serialize ◄─┼─► parse             text in / text out
//!                     │
//!           head ◄── renderer ◄── config   page assembly
//! ```
//!
//! - A **renderer** is an element factory: `h.tag("div")` looks the name up in
//!   the dialect's schema and returns a tag bound to the renderer's context.
//! - A **tag** knows which of its attributes hold asset URLs and resolves them
//!   through that context when they are set.
//! - The **head renderer** is shared by a page's renderer and all its child
//!   renderers; it deduplicates resources and renders them at the top of the
//!   page or the end of the body.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`url`] | URL splitting and prefix joining, query parameter merging |
//! | [`assets`] | Static prefix + `ver=` cache buster, content fingerprints |
//! | [`schema`] | Tag tables (`HEAD`, `HTML4`, `HTML5`): attributes and URL kinds |
//! | [`tag`] | `Tag` and `Node`: the mutable element tree |
//! | [`serialize`] | HTML and XML output, `maud::Render` integration |
//! | [`builder`] | Open/close accumulator behind nested building |
//! | [`parse`] | Lenient markup parsing into bound tags |
//! | [`head`] | Resource registries and `<head>` rendering |
//! | [`renderer`] | Page renderer, dialects, page assembly |
//! | [`config`] | `renderer.toml` loading, validation and merging |
//!
//! # Design Decisions
//!
//! ## Resolve On Set, Not On Render
//!
//! Asset URLs are rewritten when the attribute is set, so the tree always
//! holds final URLs: inspecting `img.get("src")` shows what will be written,
//! and serialization stays a plain walk. A `<link>` rewrites its `href` only
//! once its `rel` names an asset, in whichever order the two are set.
//!
//! ## Unknown Tags Fail, Unknown Attributes Don't
//!
//! Asking a renderer for a tag its dialect lacks is an error, so a typo or an
//! obsolete tag in an HTML5 page surfaces immediately. Attribute tables are
//! advisory: custom attributes are common in real pages and are only logged
//! at debug level.
//!
//! ## One Head Per Page
//!
//! Components render with `Renderer::child()`, which shares the parent's
//! head. Whatever a component registers ends up in the page's single
//! `<head>`, deduplicated by id or resolved URL.
//!
//! ## Single-Threaded
//!
//! Renderers share state through `Rc` and `RefCell`. A page is built on one
//! thread; build separate pages in parallel with separate renderers.

pub mod assets;
pub mod builder;
pub mod config;
pub mod head;
pub mod parse;
pub mod renderer;
pub mod schema;
pub mod serialize;
pub mod tag;
pub mod url;

#[cfg(test)]
pub(crate) mod test_helpers;
