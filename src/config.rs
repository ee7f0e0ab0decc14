//! Renderer configuration module.
//!
//! Handles loading, validating, and merging `renderer.toml` files. User
//! values are layered over stock defaults, so a file only names what it
//! changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! dialect = "html5"           # "html4" or "html5": tag set and doctype
//!
//! # static_url = "/static"    # Prefix joined onto relative asset URLs
//! # assets_version = "1.0"    # Appended to asset URLs as ?ver=...
//! # assets_dir = "static"     # Fingerprinted into assets_version when that is unset
//! ```
//!
//! ## Assets Version
//!
//! `assets_version` is the cache buster added to every relative asset URL.
//! When it is not set but `assets_dir` is, the version is a short SHA-256
//! fingerprint of the directory contents, so it changes exactly when an
//! asset does. A relative `assets_dir` is taken relative to the directory
//! holding `renderer.toml`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::assets::{self, AssetUrls};
use crate::renderer::Dialect;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up by [`load_config`].
pub const CONFIG_FILE: &str = "renderer.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Renderer configuration loaded from `renderer.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Tag set and doctype.
    pub dialect: Dialect,
    /// Prefix for relative asset URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_url: Option<String>,
    /// Cache-busting version added to relative asset URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_version: Option<String>,
    /// Directory fingerprinted into the version when `assets_version` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
}

impl RendererConfig {
    /// Validate values that would produce broken URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(static_url) = &self.static_url {
            if static_url.contains(['?', '#']) {
                return Err(ConfigError::Validation(
                    "static_url must not contain a query or fragment".into(),
                ));
            }
        }
        if let Some(version) = &self.assets_version {
            if version.is_empty() {
                return Err(ConfigError::Validation(
                    "assets_version must not be empty".into(),
                ));
            }
            if version.contains(|c: char| matches!(c, '&' | '#' | '=') || c.is_whitespace()) {
                return Err(ConfigError::Validation(format!(
                    "assets_version {version:?} must not contain '&', '#', '=' or whitespace"
                )));
            }
        }
        Ok(())
    }

    /// The asset URL settings, fingerprinting `assets_dir` if needed.
    pub fn asset_urls(&self) -> Result<AssetUrls, ConfigError> {
        let version = match (&self.assets_version, &self.assets_dir) {
            (Some(version), _) => Some(version.clone()),
            (None, Some(dir)) => {
                let fingerprint = assets::fingerprint_dir(dir)?;
                log::debug!("assets version {fingerprint} from {}", dir.display());
                Some(fingerprint)
            }
            (None, None) => None,
        };
        Ok(AssetUrls::new(self.static_url.clone(), version))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RendererConfig::default()).expect("default config must serialize")
}

/// Overlay the top-level keys of `overlay` onto `base`.
///
/// The config is flat: an overlay key replaces the base value whole, and
/// base keys missing from the overlay are kept.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            base_table.extend(overlay_table);
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `renderer.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RendererConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RendererConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `renderer.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// validates the result, and anchors a relative `assets_dir` at `dir`.
pub fn load_config(dir: &Path) -> Result<RendererConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    let mut config = resolve_config(base, overlay)?;
    if let Some(assets_dir) = &config.assets_dir {
        if assets_dir.is_relative() {
            config.assets_dir = Some(dir.join(assets_dir));
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock `renderer.toml`.
pub fn stock_config_toml() -> &'static str {
    r##"# Renderer Configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Tag set and doctype of generated pages: "html4" or "html5".
# HTML5 drops the obsolete presentational tags (center, font, ...).
dialect = "html5"

# Prefix joined onto relative asset URLs (stylesheets, scripts, images).
# Absolute paths ("/favicon.ico") and full URLs are left alone.
# static_url = "/static"

# Cache-busting version appended to relative asset URLs as "?ver=...".
# static_url = "/static" + assets_version = "1.0":
#   css/site.css -> /static/css/site.css?ver=1.0
# assets_version = "1.0"

# When assets_version is unset, derive it from the contents of this
# directory (relative to this file). Any asset change yields a new version.
# assets_dir = "static"
"##
}
