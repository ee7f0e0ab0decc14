//! URL resolution for static assets.
//!
//! Relative asset references (`css/site.css`) are joined onto a static URL
//! prefix (`/static/app`) so they resolve the same way from every page, and
//! can get extra query parameters appended (the `ver=` cache buster lives in
//! [`crate::assets`]).
//!
//! ## Rules
//!
//! - URLs with a scheme (`http://…`, `data:…`, `mailto:…`) are never rewritten.
//! - Absolute paths (`/logo.png`) are left alone unless `always_relative` is set.
//! - Fragment-only references (`#top`) count as absolute.
//! - An empty or missing prefix leaves the path alone.
//! - `data:` URLs never receive query parameters.
//!
//! Nothing is validated: any string is accepted and split best effort, so
//! there is no "invalid URL" error.

use std::fmt;

/// Schemes whose last path segment may carry `;params`.
const USES_PARAMS: &[&str] = &[
    "", "ftp", "hdl", "prospero", "http", "imap", "https", "shttp", "rtsp", "rtspu", "sip",
    "sips", "mms", "sftp", "tel",
];

/// Extra query parameters, kept in insertion order.
///
/// Keys are unique. They are written into the query string in reverse
/// insertion order, so a parameter added with [`UrlParams::set_default`]
/// after the caller's own ends up first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams(Vec<(String, String)>);

impl UrlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Set `key` only if it is not present yet.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.get(&key).is_none() {
            self.0.push((key, value.into()));
        }
    }

    /// Builder form of [`UrlParams::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn query_string(&self) -> String {
        self.0
            .iter()
            .rev()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = UrlParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A URL split into its six generic components.
///
/// `netloc` is `None` when the input had no `//` authority marker, which
/// keeps `//cdn.example.com/x` style prefixes intact on reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    netloc: Option<String>,
    path: String,
    params: String,
    query: String,
    fragment: String,
}

impl Url {
    /// Split `url` into scheme, netloc, path, params, query and fragment.
    ///
    /// - `"http://abc/x?a=1#f"` → scheme `http`, netloc `abc`, path `/x`, query `a=1`, fragment `f`
    /// - `"css/site.css"` → path `css/site.css`
    /// - `"data:image/png;base64,AAA"` → scheme `data`, path `image/png;base64,AAA`
    /// - `"#top"` → fragment `top`
    pub fn parse(url: &str) -> Self {
        let (scheme, rest) = split_scheme(url);

        let (netloc, rest) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after
                    .find(|c: char| matches!(c, '/' | '?' | '#'))
                    .unwrap_or(after.len());
                (Some(after[..end].to_string()), &after[end..])
            }
            None => (None, rest),
        };

        let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

        let (path, params) = if USES_PARAMS.contains(&scheme.as_str()) && path.contains(';') {
            split_params(path)
        } else {
            (path, "")
        };

        Url {
            scheme,
            netloc,
            path: path.to_string(),
            params: params.to_string(),
            query: query.to_string(),
            fragment: fragment.to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// True when the URL carries a scheme (`http:`, `data:`, ...).
    pub fn is_url(&self) -> bool {
        !self.scheme.is_empty()
    }

    /// True for `/`-rooted paths, `data:` URLs and fragment-only references.
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
            || self.scheme == "data"
            || (self.path.is_empty() && !self.fragment.is_empty())
    }

    /// Join the path onto `prefix` when it is relative, then append `params`.
    pub fn absolute(mut self, prefix: Option<&str>, always_relative: bool, params: &UrlParams) -> String {
        let prefix = prefix.unwrap_or_default();

        if !prefix.is_empty() && !self.is_url() && (always_relative || !self.is_absolute()) {
            let joined = format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            );
            log::trace!("asset path {:?} -> {:?}", self.path, joined);
            self.path = joined;
        }

        if !params.is_empty() && self.scheme != "data" {
            let query = format!("{}&{}", self.query, params.query_string());
            self.query = query.trim_start_matches('&').to_string();
        }

        self.to_string()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if let Some(netloc) = &self.netloc {
            write!(f, "//{netloc}")?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
        }
        f.write_str(&self.path)?;
        if !self.params.is_empty() {
            write!(f, ";{}", self.params)?;
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Resolve `url` against `prefix`. See the module docs for the rules.
pub fn absolute_url(url: &str, prefix: Option<&str>, always_relative: bool, params: &UrlParams) -> String {
    Url::parse(url).absolute(prefix, always_relative, params)
}

fn split_scheme(url: &str) -> (String, &str) {
    if let Some(colon) = url.find(':') {
        let candidate = &url[..colon];
        let valid = candidate
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid {
            return (candidate.to_ascii_lowercase(), &url[colon + 1..]);
        }
    }
    (String::new(), url)
}

// Params hang off the last path segment only.
fn split_params(path: &str) -> (&str, &str) {
    let segment_start = path.rfind('/').unwrap_or(0);
    match path[segment_start..].find(';') {
        Some(i) => (&path[..segment_start + i], &path[segment_start + i + 1..]),
        None => (path, ""),
    }
}
