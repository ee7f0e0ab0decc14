//! Asset URLs and cache-busting.
//!
//! An *asset URL* is a reference to a static file (stylesheet, script,
//! image) as opposed to a navigational link. Asset URLs are joined onto the
//! configured static prefix and, when an assets version is configured, get a
//! `ver=<version>` query parameter so browsers refetch them after a deploy:
//!
//! ```text
//! static_url = "/static/app", assets_version = "1.2"
//!
//! css/site.css       →  /static/app/css/site.css?ver=1.2
//! /favicon.ico       →  /favicon.ico                 (absolute: untouched)
//! https://cdn/x.js   →  https://cdn/x.js             (absolute path: untouched)
//! x.js?lang=fr       →  /static/app/x.js?lang=fr&ver=1.2
//! ```
//!
//! ## Content fingerprints
//!
//! Instead of bumping the version by hand, it can be derived from the asset
//! files themselves with [`fingerprint_dir`]: a short SHA-256 over every
//! file's relative path and contents. Any edit, addition or removal changes
//! the fingerprint; touching mtimes does not.

use crate::url::{Url, UrlParams};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Query parameter carrying the assets version.
pub const VERSION_PARAM: &str = "ver";

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 8;

/// Static prefix and assets version shared by every element of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetUrls {
    static_url: Option<String>,
    assets_version: Option<String>,
}

impl AssetUrls {
    pub fn new(static_url: Option<String>, assets_version: Option<String>) -> Self {
        Self {
            static_url,
            assets_version,
        }
    }

    pub fn with_static_url(mut self, static_url: impl Into<String>) -> Self {
        self.static_url = Some(static_url.into());
        self
    }

    pub fn with_assets_version(mut self, version: impl Into<String>) -> Self {
        self.assets_version = Some(version.into());
        self
    }

    pub fn static_url(&self) -> Option<&str> {
        self.static_url.as_deref()
    }

    pub fn assets_version(&self) -> Option<&str> {
        self.assets_version.as_deref().filter(|v| !v.is_empty())
    }

    /// Resolve a navigational URL against `prefix`.
    ///
    /// Unlike asset URLs, the static prefix is not a fallback here and no
    /// version is added.
    pub fn absolute_url(&self, url: &str, prefix: Option<&str>) -> String {
        self.absolute_url_with(url, prefix, false, &UrlParams::new())
    }

    pub fn absolute_url_with(
        &self,
        url: &str,
        prefix: Option<&str>,
        always_relative: bool,
        params: &UrlParams,
    ) -> String {
        Url::parse(url).absolute(prefix, always_relative, params)
    }

    /// Resolve an asset URL: static prefix plus the `ver` cache buster.
    pub fn absolute_asset_url(&self, url: &str) -> String {
        self.absolute_asset_url_with(url, None, false, UrlParams::new())
    }

    /// Like [`AssetUrls::absolute_asset_url`] with a prefix override and extra
    /// query parameters.
    ///
    /// The version is only added to URLs that are not already absolute, and
    /// never replaces a `ver` the caller passed explicitly.
    pub fn absolute_asset_url_with(
        &self,
        url: &str,
        prefix: Option<&str>,
        always_relative: bool,
        mut params: UrlParams,
    ) -> String {
        let parsed = Url::parse(url);

        if let Some(version) = self.assets_version() {
            if !parsed.is_absolute() {
                params.set_default(VERSION_PARAM, version);
            }
        }

        parsed.absolute(prefix.or(self.static_url()), always_relative, &params)
    }
}

/// Short SHA-256 fingerprint of a byte string.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Short SHA-256 fingerprint of every file below `dir`.
///
/// Files are visited in file-name order and hashed together with their path
/// relative to `dir`, so the result is stable across machines.
pub fn fingerprint_dir(dir: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        hasher.update(relative.as_bytes());
        hasher.update(b"\0");
        hasher.update(std::fs::read(entry.path())?);
        hasher.update(b"\0");
    }

    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..FINGERPRINT_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn version_is_added_to_relative_urls() {
        let urls = AssetUrls::default().with_assets_version("1.2");
        assert_eq!(urls.absolute_asset_url("abc"), "abc?ver=1.2");
    }

    #[test]
    fn version_is_not_added_to_absolute_urls() {
        let urls = AssetUrls::default().with_assets_version("1.2");
        assert_eq!(urls.absolute_asset_url("/abc"), "/abc");
        assert_eq!(urls.absolute_asset_url("/abc?foo=bar"), "/abc?foo=bar");
    }

    #[test]
    fn version_and_prefix_combine() {
        let urls = AssetUrls::default()
            .with_static_url("/root")
            .with_assets_version("1.2");
        assert_eq!(urls.absolute_asset_url("abc"), "/root/abc?ver=1.2");
        assert_eq!(urls.absolute_asset_url("abc?foo=bar"), "/root/abc?foo=bar&ver=1.2");
        assert_eq!(
            urls.absolute_asset_url("abc?foo=bar&hello=world"),
            "/root/abc?foo=bar&hello=world&ver=1.2"
        );
    }

    #[test]
    fn explicit_version_param_wins() {
        let urls = AssetUrls::default().with_assets_version("1.2");
        let params = UrlParams::new().with(VERSION_PARAM, "pinned");
        assert_eq!(
            urls.absolute_asset_url_with("abc", None, false, params),
            "abc?ver=pinned"
        );
    }

    #[test]
    fn full_urls_are_untouched() {
        let urls = AssetUrls::default()
            .with_static_url("/static/app")
            .with_assets_version("1.2");
        assert_eq!(urls.absolute_asset_url("https://cdn/x.js"), "https://cdn/x.js");
        assert_eq!(urls.absolute_asset_url("//cdn/x.js"), "//cdn/x.js");
        assert_eq!(
            urls.absolute_asset_url("x.js?lang=fr"),
            "/static/app/x.js?lang=fr&ver=1.2"
        );
    }

    #[test]
    fn empty_version_is_ignored() {
        let urls = AssetUrls::default().with_assets_version("");
        assert_eq!(urls.assets_version(), None);
        assert_eq!(urls.absolute_asset_url("abc"), "abc");
    }

    #[test]
    fn prefix_override_beats_static_url() {
        let urls = AssetUrls::default().with_static_url("/static/root2");
        assert_eq!(urls.absolute_asset_url("abc"), "/static/root2/abc");
        assert_eq!(urls.absolute_asset_url(""), "/static/root2/");
        assert_eq!(
            urls.absolute_asset_url_with("abc", Some("/static/root"), false, UrlParams::new()),
            "/static/root/abc"
        );
        assert_eq!(
            urls.absolute_asset_url_with("abc", Some(""), false, UrlParams::new()),
            "abc"
        );
    }

    #[test]
    fn navigational_urls_ignore_static_url() {
        let urls = AssetUrls::default().with_static_url("/static/root2");
        assert_eq!(urls.absolute_url("abc", None), "abc");
        assert_eq!(urls.absolute_url("abc", Some("/app")), "/app/abc");
    }

    #[test]
    fn plain_urls_never_get_a_version() {
        let urls = AssetUrls::default().with_assets_version("1.2");
        assert_eq!(urls.absolute_url("abc", None), "abc");
    }

    #[test]
    fn data_urls_never_get_a_version() {
        let urls = AssetUrls::default()
            .with_static_url("/static")
            .with_assets_version("1.2");
        let url = "data:text/css,body{}";
        assert_eq!(urls.absolute_asset_url(url), url);
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let fp = fingerprint(b"body { color: red }");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint(b"body { color: red }"));
        assert_ne!(fp, fingerprint(b"body { color: blue }"));
    }

    #[test]
    fn fingerprint_dir_tracks_contents_and_names() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("css")).unwrap();
        fs::write(tmp.path().join("css/site.css"), "body {}").unwrap();
        fs::write(tmp.path().join("app.js"), "run()").unwrap();

        let first = fingerprint_dir(tmp.path()).unwrap();
        assert_eq!(first, fingerprint_dir(tmp.path()).unwrap());

        fs::write(tmp.path().join("app.js"), "run(1)").unwrap();
        let edited = fingerprint_dir(tmp.path()).unwrap();
        assert_ne!(first, edited);

        fs::rename(tmp.path().join("app.js"), tmp.path().join("main.js")).unwrap();
        assert_ne!(edited, fingerprint_dir(tmp.path()).unwrap());
    }

    #[test]
    fn fingerprint_dir_reports_missing_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(fingerprint_dir(&tmp.path().join("missing")).is_err());
    }
}
