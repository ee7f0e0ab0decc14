//! Tag schemas: which tag names a renderer can build, and how.
//!
//! Each schema maps a tag name to a [`TagSpec`]: the attributes the tag
//! declares and the [`TagKind`] deciding which attributes carry asset URLs.
//! Three schemas are provided:
//!
//! | Schema | Used by | Contents |
//! |--------|---------|----------|
//! | [`HEAD`] | [`HeadRenderer`](crate::head::HeadRenderer) | `base head link meta title style script` |
//! | [`HTML4`] | [`Renderer`](crate::renderer::Renderer) in HTML 4 mode | the HTML 4.01 body tags |
//! | [`HTML5`] | [`Renderer`](crate::renderer::Renderer) in HTML5 mode | HTML 4 plus the HTML5 tags, minus obsolete ones |
//!
//! ## Layering
//!
//! [`HTML5`] does not copy [`HTML4`]: it points at it as its parent and
//! answers lookups in three steps. Names in its hidden set (obsolete HTML 4
//! tags such as `center` or `font`) answer [`Lookup::Hidden`]; its own new
//! tags answer next; everything else is delegated to the parent.
//!
//! ## Attribute sets are advisory
//!
//! Declared attributes document what a tag accepts. Nothing stops a caller
//! from setting others: [`Tag`](crate::tag::Tag) only logs them at debug
//! level. `data-*` attributes are always accepted.

use crate::tag::Attributes;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// =============================================================================
// Attribute groups
// =============================================================================

const COMPONENT: &[&str] = &["id", "class", "style", "title"];
const I18N: &[&str] = &["lang", "dir"];
const EVENTS: &[&str] = &[
    "onclick",
    "ondblclick",
    "onmousedown",
    "onmouseup",
    "onmousemove",
    "onmouseover",
    "onmouseout",
    "onkeypress",
    "onkeydown",
    "onkeyup",
];
const FOCUS: &[&str] = &["accesskey", "tabindex", "onfocus", "onblur"];
const CELL_HALIGN: &[&str] = &["align", "char", "charoff"];
const CELL_VALIGN: &[&str] = &["valign"];

/// `COMPONENT | I18N | EVENTS`, spelled out once per row.
const ALL: &[&[&str]] = &[COMPONENT, I18N, EVENTS];

/// `rel` values that make a `<link>` reference an asset.
pub const ASSET_LINK_RELS: &[&str] = &["icon", "mask-icon", "stylesheet", "manifest"];

// =============================================================================
// Descriptors
// =============================================================================

/// How a tag reacts to its URL-bearing attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// No URL rewriting.
    Plain,
    /// `href` is an asset URL.
    HrefBearing,
    /// `src` is an asset URL.
    SrcBearing,
    /// `src` and `lowsrc` are asset URLs.
    Image,
    /// `href` is an asset URL only when `rel` names an asset
    /// (see [`ASSET_LINK_RELS`]); `rel="next"` and friends stay verbatim.
    Link,
}

impl TagKind {
    /// Attributes whose values go through the asset resolver.
    pub fn url_attributes(self) -> &'static [&'static str] {
        match self {
            TagKind::Plain => &[],
            TagKind::HrefBearing | TagKind::Link => &["href"],
            TagKind::SrcBearing => &["src"],
            TagKind::Image => &["src", "lowsrc"],
        }
    }

    /// Whether the URL attributes should be rewritten given the current attributes.
    pub fn rewrites(self, attributes: &Attributes) -> bool {
        match self {
            TagKind::Plain => false,
            TagKind::HrefBearing | TagKind::SrcBearing | TagKind::Image => true,
            TagKind::Link => attributes
                .get("rel")
                .is_some_and(|rel| ASSET_LINK_RELS.contains(&rel.as_str())),
        }
    }
}

/// The attributes a tag declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrSet {
    /// No declared restriction.
    Any,
    Only(HashSet<&'static str>),
}

impl AttrSet {
    fn union(groups: &[&[&'static str]]) -> Self {
        AttrSet::Only(groups.iter().flat_map(|g| g.iter().copied()).collect())
    }
}

/// Descriptor of one tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    name: &'static str,
    attributes: AttrSet,
    kind: TagKind,
}

impl TagSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn attributes(&self) -> &AttrSet {
        &self.attributes
    }

    /// Whether `attribute` is declared for this tag.
    pub fn allows(&self, attribute: &str) -> bool {
        match &self.attributes {
            AttrSet::Any => true,
            AttrSet::Only(names) => names.contains(attribute) || attribute.starts_with("data-"),
        }
    }
}

/// Result of a schema lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    NotFound,
    /// Declared by a parent schema but shadowed by this one.
    Hidden,
    Found(&'a TagSpec),
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a TagSpec> {
        match self {
            Lookup::Found(spec) => Some(spec),
            Lookup::NotFound | Lookup::Hidden => None,
        }
    }
}

/// A set of tag descriptors, optionally layered over a parent schema.
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    tags: HashMap<&'static str, TagSpec>,
    hidden: HashSet<&'static str>,
    parent: Option<&'static Schema>,
}

impl Schema {
    fn new(name: &'static str, parent: Option<&'static Schema>) -> Self {
        Self {
            name,
            tags: HashMap::new(),
            hidden: HashSet::new(),
            parent,
        }
    }

    fn declare(&mut self, rows: &[TagRow]) {
        for &(name, groups, kind) in rows {
            let spec = TagSpec {
                name,
                attributes: AttrSet::union(groups),
                kind,
            };
            let previous = self.tags.insert(name, spec);
            debug_assert!(previous.is_none(), "tag {name} declared twice in {}", self.name);
        }
    }

    fn declare_open(&mut self, names: &[&'static str], kind: TagKind) {
        for &name in names {
            let spec = TagSpec {
                name,
                attributes: AttrSet::Any,
                kind,
            };
            let previous = self.tags.insert(name, spec);
            debug_assert!(previous.is_none(), "tag {name} declared twice in {}", self.name);
        }
    }

    fn hide(&mut self, names: &[&'static str]) {
        self.hidden.extend(names.iter().copied());
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look `name` up: hidden names first, then own tags, then the parent.
    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        if self.hidden.contains(name) {
            return Lookup::Hidden;
        }
        if let Some(spec) = self.tags.get(name) {
            return Lookup::Found(spec);
        }
        match self.parent {
            Some(parent) => parent.lookup(name),
            None => Lookup::NotFound,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TagSpec> {
        self.lookup(name).found()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every buildable tag name, sorted.
    pub fn tag_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = match self.parent {
            Some(parent) => parent.tag_names(),
            None => Vec::new(),
        };
        names.extend(self.tags.keys().copied());
        names.retain(|name| !self.hidden.contains(name));
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// `(name, attribute groups, kind)`; the groups are unioned.
type TagRow = (&'static str, &'static [&'static [&'static str]], TagKind);

// =============================================================================
// Head schema
// =============================================================================

const HEAD_TAGS: &[TagRow] = &[
    ("base", &[&["id", "href", "target"]], TagKind::HrefBearing),
    ("head", &[I18N, &["id", "profile"]], TagKind::Plain),
    (
        "link",
        &[COMPONENT, I18N, EVENTS, &["charset", "href", "hreflang", "type", "rel", "rev", "media", "target"]],
        TagKind::Link,
    ),
    (
        "meta",
        &[I18N, &["id", "http-equiv", "name", "content", "scheme"]],
        TagKind::Plain,
    ),
    ("title", &[I18N, &["id"]], TagKind::Plain),
    ("style", &[I18N, &["id", "media", "type"]], TagKind::Plain),
    (
        "script",
        &[I18N, &["id", "async", "charset", "defer", "src", "type"]],
        TagKind::SrcBearing,
    ),
];

pub static HEAD: LazyLock<Schema> = LazyLock::new(|| {
    let mut schema = Schema::new("head", None);
    schema.declare(HEAD_TAGS);
    schema
});

// =============================================================================
// HTML 4.01 schema
// =============================================================================

const HTML4_TAGS: &[TagRow] = &[
    (
        "a",
        &[COMPONENT, I18N, EVENTS, FOCUS, &["charset", "type", "name", "href", "hreflang", "rel", "rev", "shape", "coords", "target", "oncontextmenu"]],
        TagKind::Plain,
    ),
    ("abbr", ALL, TagKind::Plain),
    ("acronym", ALL, TagKind::Plain),
    ("address", ALL, TagKind::Plain),
    (
        "applet",
        &[COMPONENT, &["codebase", "archive", "code", "object", "alt", "name", "width", "height", "align", "hspace", "vspace"]],
        TagKind::Plain,
    ),
    (
        "area",
        &[COMPONENT, I18N, EVENTS, FOCUS, &["shape", "coords", "href", "nohref", "alt", "target"]],
        TagKind::Plain,
    ),
    ("b", ALL, TagKind::Plain),
    ("basefont", &[COMPONENT, I18N, &["id", "size", "color", "face"]], TagKind::Plain),
    ("bdo", &[COMPONENT, EVENTS, &["lang", "dir"]], TagKind::Plain),
    ("big", ALL, TagKind::Plain),
    ("blockquote", &[COMPONENT, I18N, EVENTS, &["cite"]], TagKind::Plain),
    (
        "body",
        &[COMPONENT, I18N, EVENTS, &["onload", "onunload", "onfocus", "background", "bgcolor", "text", "link", "vlink", "alink", "leftmargin", "topmargin", "marginwidth", "marginheight"]],
        TagKind::Plain,
    ),
    ("br", &[COMPONENT, &["clear"]], TagKind::Plain),
    (
        "button",
        &[COMPONENT, I18N, EVENTS, FOCUS, &["name", "value", "type", "disabled"]],
        TagKind::Plain,
    ),
    ("caption", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("center", ALL, TagKind::Plain),
    ("cite", ALL, TagKind::Plain),
    ("code", ALL, TagKind::Plain),
    (
        "col",
        &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN, &["span", "width"]],
        TagKind::Plain,
    ),
    (
        "colgroup",
        &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN, &["span", "width"]],
        TagKind::Plain,
    ),
    ("dd", ALL, TagKind::Plain),
    ("del", &[COMPONENT, I18N, EVENTS, &["cite", "datetime"]], TagKind::Plain),
    ("dfn", ALL, TagKind::Plain),
    ("dir", &[COMPONENT, I18N, EVENTS, &["compact"]], TagKind::Plain),
    ("div", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("dl", &[COMPONENT, I18N, EVENTS, &["compact"]], TagKind::Plain),
    ("dt", ALL, TagKind::Plain),
    ("em", ALL, TagKind::Plain),
    (
        "embed",
        &[&["width", "height", "src", "controller", "target", "border", "pluginspage", "quality", "type", "bgcolor", "menu"]],
        TagKind::SrcBearing,
    ),
    ("fieldset", ALL, TagKind::Plain),
    ("font", &[COMPONENT, I18N, &["face", "size", "color"]], TagKind::Plain),
    (
        "form",
        &[COMPONENT, I18N, EVENTS, &["action", "method", "name", "enctype", "onsubmit", "onreset", "accept-charset", "target"]],
        TagKind::Plain,
    ),
    ("frame", &[], TagKind::Plain),
    (
        "frameset",
        &[COMPONENT, &["rows", "cols", "onload", "onunload", "framespacing", "border", "marginwidth", "marginheight", "frameborder", "noresize", "scrolling"]],
        TagKind::Plain,
    ),
    ("h1", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("h2", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("h3", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("h4", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("h5", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("h6", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    (
        "hr",
        &[COMPONENT, I18N, EVENTS, &["align", "noshade", "size", "width", "color"]],
        TagKind::Plain,
    ),
    ("html", &[I18N, &["id"]], TagKind::Plain),
    ("i", ALL, TagKind::Plain),
    (
        "iframe",
        &[COMPONENT, &["longdesc", "name", "src", "frameborder", "marginwidth", "marginheight", "noresize", "scrolling", "align", "height", "width", "hspace", "vspace", "bordercolor"]],
        TagKind::Plain,
    ),
    (
        "img",
        &[COMPONENT, I18N, EVENTS, &["src", "alt", "name", "longdesc", "width", "height", "usemap", "ismap", "align", "border", "hspace", "vspace", "lowsrc"]],
        TagKind::Image,
    ),
    (
        "input",
        &[COMPONENT, I18N, EVENTS, FOCUS, &["type", "name", "value", "checked", "disabled", "readonly", "size", "maxlength", "src", "alt", "usemap", "onselect", "onchange", "accept", "align", "border"]],
        TagKind::SrcBearing,
    ),
    ("ins", &[COMPONENT, I18N, EVENTS, &["cite", "datetime"]], TagKind::Plain),
    ("isindex", &[COMPONENT, I18N, &["prompt"]], TagKind::Plain),
    ("kbd", ALL, TagKind::Plain),
    (
        "label",
        &[COMPONENT, I18N, EVENTS, &["for", "accesskey", "onfocus", "onblur"]],
        TagKind::Plain,
    ),
    ("legend", &[COMPONENT, I18N, EVENTS, &["accesskey", "align"]], TagKind::Plain),
    ("li", &[COMPONENT, I18N, EVENTS, &["type", "value"]], TagKind::Plain),
    ("map", &[I18N, EVENTS, &["id", "class", "style", "title", "name"]], TagKind::Plain),
    ("menu", &[COMPONENT, I18N, EVENTS, &["compact"]], TagKind::Plain),
    ("noframes", ALL, TagKind::Plain),
    ("noscript", ALL, TagKind::Plain),
    (
        "object",
        &[COMPONENT, I18N, EVENTS, &["declare", "classid", "codebase", "data", "type", "codetype", "archive", "standby", "height", "width", "usemap", "name", "tabindex", "align", "border", "hspace", "vspace"]],
        TagKind::Plain,
    ),
    ("ol", &[COMPONENT, I18N, EVENTS, &["type", "compact", "start"]], TagKind::Plain),
    ("optgroup", &[COMPONENT, I18N, EVENTS, &["disabled", "label"]], TagKind::Plain),
    (
        "option",
        &[COMPONENT, I18N, EVENTS, &["selected", "disabled", "label", "value"]],
        TagKind::Plain,
    ),
    ("p", &[COMPONENT, I18N, EVENTS, &["align"]], TagKind::Plain),
    ("param", &[&["id", "name", "value", "valuetype", "type"]], TagKind::Plain),
    ("pre", &[COMPONENT, I18N, EVENTS, &["width"]], TagKind::Plain),
    ("q", &[COMPONENT, I18N, EVENTS, &["cite"]], TagKind::Plain),
    ("s", ALL, TagKind::Plain),
    ("samp", ALL, TagKind::Plain),
    (
        "script",
        &[&["id", "charset", "type", "language", "src", "defer"]],
        TagKind::SrcBearing,
    ),
    (
        "select",
        &[COMPONENT, I18N, EVENTS, &["name", "size", "multiple", "disabled", "tabindex", "onfocus", "onblur", "onchange", "rows"]],
        TagKind::Plain,
    ),
    ("small", ALL, TagKind::Plain),
    ("span", ALL, TagKind::Plain),
    ("strike", ALL, TagKind::Plain),
    ("strong", ALL, TagKind::Plain),
    ("style", &[I18N, &["id", "type", "media", "title"]], TagKind::Plain),
    ("sub", ALL, TagKind::Plain),
    ("sup", ALL, TagKind::Plain),
    ("table", &[COMPONENT, I18N, &["prompt"]], TagKind::Plain),
    ("tbody", &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN], TagKind::Plain),
    (
        "td",
        &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN, &["abbr", "axis", "headers", "scope", "rowspan", "colspan", "nowrap", "bgcolor", "width", "height", "background", "bordercolor"]],
        TagKind::Plain,
    ),
    (
        "textarea",
        &[COMPONENT, I18N, EVENTS, FOCUS, &["name", "rows", "cols", "disabled", "readonly", "onselect", "onchange", "wrap"]],
        TagKind::Plain,
    ),
    ("tfoot", &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN], TagKind::Plain),
    (
        "th",
        &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN, &["abbr", "axis", "headers", "scope", "rowspan", "colspan", "nowrap", "bgcolor", "width", "height", "background", "bordercolor"]],
        TagKind::Plain,
    ),
    ("thead", &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN], TagKind::Plain),
    (
        "tr",
        &[COMPONENT, I18N, EVENTS, CELL_HALIGN, CELL_VALIGN, &["bgcolor", "nowrap", "width", "background"]],
        TagKind::Plain,
    ),
    ("tt", ALL, TagKind::Plain),
    ("u", ALL, TagKind::Plain),
    ("ul", &[COMPONENT, I18N, EVENTS, &["type", "compact"]], TagKind::Plain),
    ("var", ALL, TagKind::Plain),
];

pub static HTML4: LazyLock<Schema> = LazyLock::new(|| {
    let mut schema = Schema::new("html4", None);
    schema.declare(HTML4_TAGS);
    schema
});

// =============================================================================
// HTML5 schema
// =============================================================================

const HTML5_NEW_TAGS: &[&str] = &[
    "section",
    "article",
    "aside",
    "hgroup",
    "header",
    "footer",
    "nav",
    "figure",
    "figcaption",
    "main",
    "time",
    "mark",
    "meta",
    "progress",
    "meter",
    "ruby",
    "rt",
    "rp",
    "wbr",
    "canvas",
    "command",
    "details",
    "summary",
    "datalist",
    "keygen",
    "output",
];

/// Redeclared as plain elements: their `src` is never rewritten in HTML5.
const HTML5_PLAIN_MEDIA_TAGS: &[&str] = &["embed", "video", "audio", "source", "track"];

const HTML5_OBSOLETE_TAGS: &[&str] = &[
    "basefont", "big", "center", "font", "strike", "tt", "frame", "frameset", "noframes",
    "acronym", "applet", "isindex", "dir",
];

pub static HTML5: LazyLock<Schema> = LazyLock::new(|| {
    let mut schema = Schema::new("html5", Some(&*HTML4));
    schema.declare_open(HTML5_NEW_TAGS, TagKind::Plain);
    schema.declare_open(HTML5_PLAIN_MEDIA_TAGS, TagKind::Plain);
    schema.hide(HTML5_OBSOLETE_TAGS);
    schema
});
