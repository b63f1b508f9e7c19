//! Thumbnailer configuration.
//!
//! Handles loading, validating, and merging a `thumbcache.toml` file on top of
//! the stock defaults. Every key is optional; a file only needs the values it
//! wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! driver = "image"              # Image backend: "image" or "fast"
//! web_root = "."                # Directory public paths are relative to
//! base_url = ""                 # Prefix for generated URLs (e.g. a CDN host)
//! cache_path = "/assets/thumbs/" # Cache root, relative to web_root
//! cache_time = 2592000          # Seconds before an entry goes stale (30 days)
//! quality = 100                 # Default encoding quality (0-100)
//! retina_support = false        # Also build @2x variants when possible
//! new_dir_mode = 0o775          # Mode for created cache directories
//! new_file_mode = 0o660         # Mode for written cache files
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which [`ImageBackend`](crate::imaging::ImageBackend) does the pixel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// `image::imageops`, Lanczos3 resampling.
    #[default]
    Image,
    /// `fast_image_resize` for resizing, `image` for everything else.
    Fast,
}

/// Configuration loaded from `thumbcache.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbConfig {
    pub driver: Driver,
    /// Source paths and the cache root are resolved against this directory.
    pub web_root: PathBuf,
    /// Prepended to every generated URL. Empty means root-relative URLs.
    pub base_url: String,
    /// Cache root below `web_root`, also used as the URL path.
    pub cache_path: String,
    /// Seconds an entry stays fresh.
    pub cache_time: u64,
    /// Default output quality, overridden per request by the `quality`
    /// operation.
    pub quality: u32,
    pub retina_support: bool,
    pub new_dir_mode: u32,
    pub new_file_mode: u32,
}

impl Default for ThumbConfig {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            web_root: PathBuf::from("."),
            base_url: String::new(),
            cache_path: "/assets/thumbs/".to_string(),
            cache_time: 2_592_000,
            quality: 100,
            retina_support: false,
            new_dir_mode: 0o775,
            new_file_mode: 0o660,
        }
    }
}

impl ThumbConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 0-100".into()));
        }
        if self.new_dir_mode > 0o7777 {
            return Err(ConfigError::Validation(format!(
                "new_dir_mode {:o} is not a permission mode",
                self.new_dir_mode
            )));
        }
        if self.new_file_mode > 0o7777 {
            return Err(ConfigError::Validation(format!(
                "new_file_mode {:o} is not a permission mode",
                self.new_file_mode
            )));
        }
        if self.cache_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cache_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ThumbConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse config text, merge it onto the stock defaults and validate.
pub fn parse_config(text: &str) -> Result<ThumbConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(text)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: ThumbConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, or the stock defaults when no path is
/// given. A path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<ThumbConfig, ConfigError> {
    match path {
        Some(path) => parse_config(&fs::read_to_string(path)?),
        None => {
            let config = ThumbConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Returns a fully-commented stock `thumbcache.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbcache configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Image backend.
#   "image" - image crate, Lanczos3 resampling
#   "fast"  - SIMD resizing via fast_image_resize
driver = "image"

# Directory that public source paths and the cache root are relative to.
web_root = "."

# Prefix for generated URLs, e.g. "https://cdn.example.com".
# Empty produces root-relative URLs.
base_url = ""

# Cache root below web_root. Also the URL path of cached files.
cache_path = "/assets/thumbs/"

# Seconds before a cached thumbnail is rebuilt (30 days).
cache_time = 2592000

# Default encoding quality (0-100). A "quality" parameter overrides it
# for a single thumbnail.
quality = 100

# Also build a @2x variant when the source has enough resolution.
retina_support = false

# Permission bits for created cache directories and files.
new_dir_mode = 0o775
new_file_mode = 0o660
"##
}
