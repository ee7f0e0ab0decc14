//! URL resolution property tests
//!
//! Property-based tests for prefix joining, cache busting and head
//! registration order.

use proptest::prelude::*;
use tagtree::assets::AssetUrls;
use tagtree::head::{HeadRenderer, ResourceOptions};
use tagtree::url::{UrlParams, absolute_url};

// ============================================================================
// Property-Based Tests: absolute_url
// ============================================================================

proptest! {
    /// `/`-rooted paths are never rewritten, whatever the prefix.
    #[test]
    fn prop_rooted_paths_are_untouched(
        path in "/[a-z0-9._-]{0,8}(/[a-z0-9._-]{1,8}){0,3}",
        prefix in "(/[a-z]{1,6}){0,3}/?",
    ) {
        prop_assert_eq!(absolute_url(&path, Some(&prefix), false, &UrlParams::new()), path);
    }

    /// URLs with a scheme are never rewritten.
    #[test]
    fn prop_scheme_urls_are_untouched(
        url in "(http|https|ftp)://[a-z]{1,10}\\.[a-z]{2,3}(/[a-z0-9]{1,8}){0,3}",
        prefix in "(/[a-z]{1,6}){1,3}",
        always_relative in any::<bool>(),
    ) {
        prop_assert_eq!(absolute_url(&url, Some(&prefix), always_relative, &UrlParams::new()), url);
    }

    /// `data:` URLs are neither rewritten nor given parameters.
    #[test]
    fn prop_data_urls_are_untouched(
        payload in "[A-Za-z0-9+/]{0,24}={0,2}",
        key in "[a-z]{1,6}",
        value in "[a-z0-9.]{1,6}",
    ) {
        let url = format!("data:image/png;base64,{payload}");
        let params = UrlParams::new().with(key, value);
        prop_assert_eq!(absolute_url(&url, Some("/static"), true, &params), url);
    }

    /// Relative paths are joined onto the prefix with exactly one slash.
    #[test]
    fn prop_relative_paths_join_prefix(
        path in "[a-z][a-z0-9.]{0,8}(/[a-z0-9.]{1,8}){0,3}/?",
        prefix in "(/[a-z]{1,6}){1,3}/?",
    ) {
        let resolved = absolute_url(&path, Some(&prefix), false, &UrlParams::new());
        prop_assert_eq!(&resolved, &format!("{}/{}", prefix.trim_end_matches('/'), path));
        prop_assert!(!resolved.contains("//"));
    }

    /// Without a prefix, relative paths are left alone.
    #[test]
    fn prop_no_prefix_no_rewrite(path in "[a-z][a-z0-9./]{0,20}") {
        prop_assert_eq!(absolute_url(&path, None, false, &UrlParams::new()), path.clone());
        prop_assert_eq!(absolute_url(&path, Some(""), false, &UrlParams::new()), path);
    }
}

// ============================================================================
// Property-Based Tests: cache busting
// ============================================================================

proptest! {
    /// Relative asset URLs get the version exactly once; rooted ones never.
    #[test]
    fn prop_version_added_once_to_relative_urls(
        path in "[a-z][a-z0-9]{0,8}(/[a-z0-9]{1,8}){0,2}",
        query in "([a-u]{1,4}=[a-z0-9]{1,4})?",
        version in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
    ) {
        let urls = AssetUrls::default().with_static_url("/static").with_assets_version(version.clone());
        let url = if query.is_empty() { path.clone() } else { format!("{path}?{query}") };

        let relative = urls.absolute_asset_url(&url);
        prop_assert_eq!(relative.matches("ver=").count(), 1);
        let expected_suffix = format!("ver={version}");
        prop_assert!(relative.ends_with(&expected_suffix));
        prop_assert!(relative.starts_with("/static/"));

        let rooted = format!("/{url}");
        prop_assert_eq!(urls.absolute_asset_url(&rooted), rooted);
    }
}

// ============================================================================
// Property-Based Tests: head registration
// ============================================================================

proptest! {
    /// Registering the same URLs again changes nothing; order is first-seen order.
    #[test]
    fn prop_registration_is_idempotent(
        names in prop::collection::vec("[a-z]{1,6}\\.css", 1..8),
    ) {
        let head = HeadRenderer::new(AssetUrls::default().with_static_url("/s"));
        for name in &names {
            head.register_css_url(name, ResourceOptions::default());
        }
        let first = head.render_top().to_string();

        for name in &names {
            prop_assert!(!head.register_css_url(name, ResourceOptions::default()));
        }
        prop_assert_eq!(head.render_top().to_string(), first);

        let mut seen: Vec<String> = Vec::new();
        for name in &names {
            let resolved = format!("/s/{name}");
            if !seen.contains(&resolved) {
                seen.push(resolved);
            }
        }
        let keys: Vec<String> = head.manifest().css_urls.keys().cloned().collect();
        prop_assert_eq!(keys, seen);
    }
}
