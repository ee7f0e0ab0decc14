//! Parse front end: markup text to [`Tag`] trees.
//!
//! Tokenizing is done by `quick-xml` in a lenient configuration (unmatched
//! and mismatched end tags are tolerated), with a little HTML awareness on
//! top when parsing with [`Method::Html`]:
//!
//! - tag and attribute names are lowercased
//! - void elements (`<br>`, `<img>`) never take children, closed or not
//! - unquoted and valueless attributes are accepted
//! - HTML named entities (`&nbsp;`, `&copy;`) resolve next to the XML ones
//! - a bare `&` that starts no reference is literal text
//! - `<script>` and `<style>` content is text up to the matching end tag
//!
//! An end tag closes the nearest open element of the same name and every
//! element opened after it; an end tag matching nothing is dropped.
//!
//! Parsed tags are bound to the renderer's [`TagContext`] but are plain
//! elements: their URL attributes are kept as written.

use crate::builder::Builder;
use crate::serialize::Method;
use crate::tag::{Node, Tag, TagContext};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Elements that never take children in HTML.
const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "embed", "frame", "hr", "img", "input", "isindex",
    "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is read verbatim up to their end tag in HTML.
const HTML_RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read markup: {0}")]
    Io(#[from] io::Error),
    #[error("markup is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed markup at byte {position}: {source}")]
    Markup {
        /// Byte offset; in HTML mode, of the input with bare `&` escaped.
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("no root element found")]
    Empty,
    #[error("expected a single root element, found {0}")]
    MultipleRoots(usize),
}

impl ParseError {
    /// Move a markup error position by `base` bytes.
    fn shifted(self, base: usize) -> Self {
        match self {
            ParseError::Markup { position, source } => ParseError::Markup {
                position: position + base as u64,
                source,
            },
            other => other,
        }
    }
}

/// How to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Flavour of the parsed tags, and of the tokenizer.
    pub method: Method,
    /// Return every top-level node instead of a single root element.
    pub fragment: bool,
    /// In fragment mode, drop text before the first element.
    pub no_leading_text: bool,
}

impl ParseOptions {
    pub fn xml() -> Self {
        Self {
            method: Method::Xml,
            ..Self::default()
        }
    }

    pub fn fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    pub fn no_leading_text(mut self) -> Self {
        self.no_leading_text = true;
        self
    }
}

/// Result of a parse: one root element, or a fragment's top-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Element(Tag),
    Fragment(Vec<Node>),
}

impl Parsed {
    pub fn into_element(self) -> Option<Tag> {
        match self {
            Parsed::Element(tag) => Some(tag),
            Parsed::Fragment(_) => None,
        }
    }

    /// The parsed nodes; a single root becomes a one-element list.
    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            Parsed::Element(tag) => vec![Node::Element(tag)],
            Parsed::Fragment(nodes) => nodes,
        }
    }
}

pub(crate) fn parse_file(path: &Path, options: &ParseOptions, context: &Rc<TagContext>) -> Result<Parsed, ParseError> {
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, options, context)
}

pub(crate) fn parse_reader(mut source: impl Read, options: &ParseOptions, context: &Rc<TagContext>) -> Result<Parsed, ParseError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    parse_bytes(&bytes, options, context)
}

pub(crate) fn parse_bytes(bytes: &[u8], options: &ParseOptions, context: &Rc<TagContext>) -> Result<Parsed, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    parse_str(text, options, context)
}

pub(crate) fn parse_str(text: &str, options: &ParseOptions, context: &Rc<TagContext>) -> Result<Parsed, ParseError> {
    let make_tag = |name: &str| Tag::bound(name, options.method, Rc::clone(context));
    let mut nodes = read_nodes(text, options.method, make_tag)?;

    if options.fragment {
        if options.no_leading_text && matches!(nodes.first(), Some(Node::Text(_))) {
            nodes.remove(0);
        }
        return Ok(Parsed::Fragment(nodes));
    }

    let mut elements: Vec<Tag> = nodes.into_iter().filter_map(Node::into_element).collect();
    match elements.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(Parsed::Element(elements.remove(0))),
        n => Err(ParseError::MultipleRoots(n)),
    }
}

fn read_nodes(text: &str, method: Method, make_tag: impl Fn(&str) -> Tag) -> Result<Vec<Node>, ParseError> {
    let html = method == Method::Html;
    let text = if html { escape_bare_ampersands(text) } else { Cow::Borrowed(text) };
    let text: &str = &text;

    // Byte offset of `reader`'s input within `text`; moves past raw text.
    let mut offset = 0;
    let mut reader = lenient_reader(text);
    let mut builder = Builder::new();
    let mut open_names: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = start_tag(&reader, &e, html, &make_tag).map_err(|err| err.shifted(offset))?;
                if html && HTML_VOID_ELEMENTS.contains(&tag.name()) {
                    builder.push(tag);
                } else if html && HTML_RAW_TEXT_ELEMENTS.contains(&tag.name()) {
                    let content_start = offset + reader.buffer_position() as usize;
                    let (content, resume) = raw_text(text, content_start, tag.name());
                    builder.open(tag);
                    if !content.is_empty() {
                        builder.push_text(content);
                    }
                    builder.close();
                    offset = resume;
                    reader = lenient_reader(&text[resume..]);
                } else {
                    open_names.push(tag.name().to_string());
                    builder.open(tag);
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = start_tag(&reader, &e, html, &make_tag).map_err(|err| err.shifted(offset))?;
                builder.push(tag);
            }
            Ok(Event::End(e)) => {
                let name = decode_name(&reader, e.name().as_ref(), html).map_err(|err| err.shifted(offset))?;
                match open_names.iter().rposition(|open| *open == name) {
                    Some(index) => {
                        while open_names.len() > index {
                            open_names.pop();
                            builder.close();
                        }
                    }
                    None => log::debug!("ignoring unmatched end tag </{name}>"),
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .decode()
                    .map_err(|err| markup_error(&reader, err.into()).shifted(offset))?;
                builder.push_text(&text);
            }
            Ok(Event::CData(e)) => {
                let text = decode(&reader, &e).map_err(|err| err.shifted(offset))?;
                builder.push_text(&text);
            }
            Ok(Event::GeneralRef(e)) => {
                let name = e
                    .decode()
                    .map_err(|err| markup_error(&reader, err.into()).shifted(offset))?;
                builder.push_text(&resolve_reference(&name));
            }
            Ok(Event::Comment(e)) => {
                let text = decode(&reader, &e).map_err(|err| err.shifted(offset))?;
                builder.push(Node::comment(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(markup_error(&reader, err).shifted(offset)),
        }
    }

    if !open_names.is_empty() {
        log::debug!("closing {} unterminated element(s) at end of input", open_names.len());
    }
    Ok(builder.take_roots())
}

fn lenient_reader(text: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Content of a raw text element opened at `start`, and the offset just past
/// its end tag. An unterminated element runs to the end of the input.
fn raw_text<'t>(text: &'t str, start: usize, name: &str) -> (&'t str, usize) {
    let rest = &text[start..];
    let Some(close) = find_end_tag(rest, name) else {
        log::debug!("unterminated <{name}> runs to end of input");
        return (rest, text.len());
    };
    let after = &rest[close..];
    let resume = after.find('>').map_or(text.len(), |gt| start + close + gt + 1);
    (&rest[..close], resume)
}

/// Byte index of the first `</name` (any case) in `text`.
fn find_end_tag(text: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    text.as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Rewrite every `&` that does not start a `name;` or `#num;` reference as
/// `&amp;`, leaving `<script>` and `<style>` content alone.
fn escape_bare_ampersands(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(index) = rest.find(['&', '<']) {
        let (before, from) = rest.split_at(index);
        out.push_str(before);

        if let Some(after) = from.strip_prefix('&') {
            out.push('&');
            if !starts_with_reference(after) {
                out.push_str("amp;");
            }
            rest = after;
            continue;
        }

        match raw_text_start(from) {
            Some(name) => {
                let end = match find_end_tag(&from[1..], name) {
                    Some(close) => {
                        let close = close + 1;
                        from[close..].find('>').map_or(from.len(), |gt| close + gt + 1)
                    }
                    None => from.len(),
                };
                out.push_str(&from[..end]);
                rest = &from[end..];
            }
            None => {
                out.push('<');
                rest = &from[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn starts_with_reference(after: &str) -> bool {
    let name_len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
        .unwrap_or(after.len());
    name_len > 0 && after[name_len..].starts_with(';')
}

/// Name of the raw text element whose start tag begins `markup`, if any.
fn raw_text_start(markup: &str) -> Option<&'static str> {
    HTML_RAW_TEXT_ELEMENTS.iter().copied().find(|name| {
        let bytes = markup.as_bytes();
        let end = name.len() + 1;
        bytes.len() > end
            && bytes[1..end].eq_ignore_ascii_case(name.as_bytes())
            && matches!(bytes[end], b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')
    })
}

fn start_tag(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    html: bool,
    make_tag: &impl Fn(&str) -> Tag,
) -> Result<Tag, ParseError> {
    let name = decode_name(reader, e.name().as_ref(), html)?;
    let mut tag = make_tag(&name);

    let attributes = if html { e.html_attributes() } else { e.attributes() };
    for attr in attributes {
        let attr = attr.map_err(|err| markup_error(reader, err.into()))?;
        let key = decode_name(reader, attr.key.as_ref(), html)?;
        let raw = decode(reader, &attr.value)?;
        let value = unescape(&raw).into_owned();
        tag.set_raw_attribute(key, value);
    }
    Ok(tag)
}

fn decode_name(reader: &Reader<&[u8]>, raw: &[u8], html: bool) -> Result<String, ParseError> {
    let name = decode(reader, raw)?;
    Ok(if html {
        name.to_ascii_lowercase()
    } else {
        name.into_owned()
    })
}

fn decode<'b>(reader: &Reader<&[u8]>, raw: &'b [u8]) -> Result<Cow<'b, str>, ParseError> {
    reader
        .decoder()
        .decode(raw)
        .map_err(|err| markup_error(reader, err.into()))
}

fn markup_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> ParseError {
    ParseError::Markup {
        position: reader.error_position(),
        source,
    }
}

/// Unescape an attribute value; malformed references stay as written.
fn unescape(raw: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape_with(raw, resolve_entity) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("keeping attribute value {raw:?} as written: {err}");
            Cow::Borrowed(raw)
        }
    }
}

fn resolve_reference(name: &str) -> String {
    let reference = format!("&{name};");
    match quick_xml::escape::unescape_with(&reference, resolve_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => {
            log::debug!("unknown entity reference {reference}");
            reference
        }
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    quick_xml::escape::resolve_predefined_entity(name).or(match name {
        "nbsp" => Some("\u{a0}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "trade" => Some("\u{2122}"),
        "hellip" => Some("\u{2026}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "middot" => Some("\u{b7}"),
        "euro" => Some("\u{20ac}"),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::SerializeOptions;
    use crate::test_helpers::context;

    fn parse(text: &str, options: ParseOptions) -> Result<Parsed, ParseError> {
        parse_str(text, &options, &context(None, None))
    }

    fn root(text: &str, options: ParseOptions) -> Tag {
        parse(text, options).unwrap().into_element().unwrap()
    }

    #[test]
    fn html_parse_serializes_html() {
        let tag = root("<html><body/></html>", ParseOptions::default());
        assert_eq!(tag.to_string(), "<html><body></body></html>");
    }

    #[test]
    fn xml_parse_serializes_xml() {
        let tag = root("<html><body/></html>", ParseOptions::xml());
        assert_eq!(tag.method(), Method::Xml);
        assert_eq!(tag.to_string(), "<html><body/></html>");
    }

    #[test]
    fn html_void_elements_do_not_swallow_siblings() {
        let tag = root(r#"<P>a<BR>b<img SRC="x.png">c</P>"#, ParseOptions::default());
        assert_eq!(tag.to_string(), r#"<p>a<br>b<img src="x.png">c</p>"#);
    }

    #[test]
    fn end_tag_closes_unterminated_children() {
        let tag = root("<ul><li>one<li>two</ul>", ParseOptions::default());
        assert_eq!(tag.to_string(), "<ul><li>one<li>two</li></li></ul>");
    }

    #[test]
    fn unmatched_end_tags_are_dropped() {
        let tag = root("<div>a</span>b</div>", ParseOptions::default());
        assert_eq!(tag.to_string(), "<div>ab</div>");
    }

    #[test]
    fn entities_are_resolved() {
        let tag = root("<p title=\"a &amp; b\">x&nbsp;&lt;&#65;&bogus;</p>", ParseOptions::default());
        assert_eq!(tag.get("title"), Some("a & b"));
        assert_eq!(tag.text(), "x\u{a0}<A&bogus;");
    }

    #[test]
    fn script_and_style_content_is_raw_text() {
        let tag = root("<div><script>if (a < b) { go(); }</script></div>", ParseOptions::default());
        assert_eq!(tag.to_string(), "<div><script>if (a < b) { go(); }</script></div>");

        let tag = root(
            "<head><STYLE media=\"all\">p > a { x: 1 }</Style><title>t</title></head>",
            ParseOptions::default(),
        );
        assert_eq!(tag.elements().count(), 2);
        assert_eq!(
            tag.to_string(),
            r#"<head><style media="all">p > a { x: 1 }</style><title>t</title></head>"#
        );
    }

    #[test]
    fn script_content_keeps_ampersands_and_markup() {
        let tag = root(
            "<p><script>a && b; x = '<b>&amp;</b>';</script>&copy;</p>",
            ParseOptions::default(),
        );
        let script = tag.elements().next().unwrap();
        assert_eq!(script.text(), "a && b; x = '<b>&amp;</b>';");
        assert_eq!(tag.text(), "a && b; x = '<b>&amp;</b>';\u{a9}");
    }

    #[test]
    fn unterminated_script_runs_to_end_of_input() {
        let nodes = parse("<script>let a = 1 < 2;", ParseOptions::default().fragment())
            .unwrap()
            .into_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].to_string(), "<script>let a = 1 < 2;</script>");
    }

    #[test]
    fn bare_ampersands_are_literal_text() {
        let tag = root("<p>Tom & Jerry</p>", ParseOptions::default());
        assert_eq!(tag.text(), "Tom & Jerry");
        assert_eq!(tag.to_string(), "<p>Tom &amp; Jerry</p>");

        let tag = root(r#"<a href="?a=1&b=2">AT&T &amp; co&</a>"#, ParseOptions::default());
        assert_eq!(tag.get("href"), Some("?a=1&b=2"));
        assert_eq!(tag.text(), "AT&T & co&");
    }

    #[test]
    fn markup_error_position_counts_from_input_start() {
        let result = parse("<div><script>x</script><p><!-- open", ParseOptions::default());
        match result {
            Err(ParseError::Markup { position, .. }) => assert!(position >= 23, "{position}"),
            other => panic!("expected markup error, got {other:?}"),
        }
    }

    #[test]
    fn comments_and_cdata_are_kept() {
        let tag = root("<div><!-- c --><![CDATA[a<b]]></div>", ParseOptions::xml());
        assert_eq!(tag.nodes(), &[Node::comment(" c "), Node::text("a<b")]);
    }

    #[test]
    fn parsed_urls_are_kept_as_written() {
        let parsed = parse_str(
            r#"<img src="a.png"/>"#,
            &ParseOptions::default(),
            &context(Some("/static"), Some("1")),
        );
        assert_eq!(parsed.unwrap().into_element().unwrap().get("src"), Some("a.png"));
    }

    #[test]
    fn fragment_keeps_leading_text() {
        let options = ParseOptions::default().fragment();
        let nodes = parse("lead<a>x</a>tail", options).unwrap().into_nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::text("lead"));

        let options = options.no_leading_text();
        let nodes = parse("lead<a>x</a>tail", options).unwrap().into_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], Node::text("tail"));
    }

    #[test]
    fn non_fragment_needs_exactly_one_root() {
        assert!(matches!(parse("  ", ParseOptions::default()), Err(ParseError::Empty)));
        assert!(matches!(
            parse("<a/><b/>", ParseOptions::default()),
            Err(ParseError::MultipleRoots(2))
        ));
        let tag = root("\n<a/>\n", ParseOptions::default());
        assert_eq!(tag.name(), "a");
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let result = parse_bytes(b"<p>\xff</p>", &ParseOptions::default(), &context(None, None));
        assert!(matches!(result, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn malformed_markup_reports_position() {
        let result = parse("<p><!-- never closed", ParseOptions::default());
        assert!(matches!(result, Err(ParseError::Markup { .. })));
    }

    #[test]
    fn reader_and_file_sources() {
        let ctx = context(None, None);
        let from_reader = parse_reader("<p>r</p>".as_bytes(), &ParseOptions::default(), &ctx).unwrap();
        assert_eq!(from_reader.into_element().unwrap().text(), "r");

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("page.html");
        std::fs::write(&path, "<p>f</p>").unwrap();
        let from_file = parse_file(&path, &ParseOptions::default(), &ctx).unwrap();
        assert_eq!(from_file.into_element().unwrap().text(), "f");

        let missing = parse_file(&tmp.path().join("missing.html"), &ParseOptions::default(), &ctx);
        assert!(matches!(missing, Err(ParseError::Io(_))));
    }

    #[test]
    fn template_ids_survive_parsing() {
        let tag = root(r#"<div tpl:id="3">x</div>"#, ParseOptions::default());
        assert_eq!(
            tag.serialize(&SerializeOptions::default().without_pipeline()),
            "<div>x</div>"
        );
    }
}
