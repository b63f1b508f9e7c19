//! Shared test utilities for the thumbcache test suite.
//!
//! Image fixtures are generated on the fly rather than checked in, and every
//! filesystem test gets its own `TempDir` as web root.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! create_test_jpeg(&tmp.path().join("photo.jpg"), 800, 600);
//! let config = config_in(tmp.path());
//! ```

use crate::config::ThumbConfig;
use image::{DynamicImage, ImageBuffer, Rgba, RgbImage};
use std::path::Path;

// =========================================================================
// Images
// =========================================================================

/// RGBA image whose pixel at `(x, y)` is `[x % 256, y % 256, 128, 255]`.
///
/// Every pixel is distinct along each axis, so flips and rotations can be
/// checked by sampling corners.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

/// Write a real JPEG of the given size, creating parent directories.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    });
    img.save(path).unwrap();
}

// =========================================================================
// Configuration
// =========================================================================

/// Stock configuration rooted at `web_root`.
pub fn config_in(web_root: &Path) -> ThumbConfig {
    ThumbConfig {
        web_root: web_root.to_path_buf(),
        ..ThumbConfig::default()
    }
}
