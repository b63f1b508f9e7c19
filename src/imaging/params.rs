//! Argument types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`interpreter`](crate::interpreter) (which turns a
//! declarative parameter map into a plan) and the [`backend`](super::backend)
//! (which does the actual pixel work). Keeping them backend-neutral is what
//! lets the `image` and `fast` drivers, and the test mock, share one plan.
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality (0–100). Clamped on construction.
//! - [`Master`]: Which dimension drives a resize.
//! - [`FlipDirection`]: Horizontal or vertical mirror.
//! - [`Offset`]: Placement of a crop window or watermark along one axis.
//! - [`Color`]: Opaque RGB color parsed from `#rgb` / `#rrggbb`.
//! - [`OutputFormat`]: Encoder selected from the cache file extension.
//! - [`ResizeArgs`], [`CropArgs`], [`ReflectionArgs`], [`WatermarkArgs`],
//!   [`BackgroundArgs`]: per-operation argument bundles.

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Resize master dimension.
///
/// The integer codes match the constants historically used in parameter
/// maps (`1` = none … `6` = precise), so stored parameter sets keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Master {
    /// Stretch to exactly the requested size.
    None,
    /// Width drives, height follows the aspect ratio.
    Width,
    /// Height drives, width follows the aspect ratio.
    Height,
    /// Fit inside the requested box.
    Auto,
    /// Cover the requested box (fit outside).
    Inverse,
    /// Keep the aspect ratio and grow to cover the requested box.
    Precise,
}

impl Master {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0x01 => Some(Self::None),
            0x02 => Some(Self::Width),
            0x03 => Some(Self::Height),
            0x04 => Some(Self::Auto),
            0x05 => Some(Self::Inverse),
            0x06 => Some(Self::Precise),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "width" => Some(Self::Width),
            "height" => Some(Self::Height),
            "auto" => Some(Self::Auto),
            "inverse" => Some(Self::Inverse),
            "precise" => Some(Self::Precise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
}

impl FlipDirection {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0x11 => Some(Self::Horizontal),
            0x12 => Some(Self::Vertical),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "horizontal" => Some(Self::Horizontal),
            "vertical" => Some(Self::Vertical),
            _ => None,
        }
    }
}

/// Position along one axis.
///
/// - `Center`: centered (the default when no offset is given)
/// - `End`: flush against the right / bottom edge
/// - `Pixels(n)`: `n >= 0` counts from the left / top, `n < 0` from the
///   right / bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Offset {
    #[default]
    Center,
    End,
    Pixels(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Parse `#rgb`, `#rrggbb`, `rgb` or `rrggbb`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Encoder for a cache file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Tiff,
    Avif,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            "tif" | "tiff" => Some(Self::Tiff),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }
}

/// Arguments for a resize. Missing sides are derived from the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeArgs {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub master: Option<Master>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArgs {
    pub width: u32,
    pub height: u32,
    pub offset_x: Offset,
    pub offset_y: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionArgs {
    /// Reflection height; `None` (or anything taller than the image) mirrors
    /// the full image.
    pub height: Option<u32>,
    pub opacity: u8,
    pub fade_in: bool,
}

impl Default for ReflectionArgs {
    fn default() -> Self {
        Self {
            height: None,
            opacity: 100,
            fade_in: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkArgs {
    pub offset_x: Offset,
    pub offset_y: Offset,
    pub opacity: u8,
}

impl Default for WatermarkArgs {
    fn default() -> Self {
        Self {
            offset_x: Offset::Center,
            offset_y: Offset::Center,
            opacity: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundArgs {
    pub color: Color,
    pub opacity: u8,
}
