//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines every operation the interpreter can
//! dispatch: open, the eight transformations, save, and render. Each
//! transformation consumes the working image and returns the next one, so a
//! plan is a plain fold over its operations.
//!
//! Two implementations ship with the crate and are chosen by
//! [`Driver`](crate::config::Driver):
//!
//! | Driver | Backend | Resize |
//! |---|---|---|
//! | `image` | [`RustBackend`](super::rust_backend::RustBackend) | `image::imageops`, Lanczos3 |
//! | `fast` | [`FastBackend`](super::fast_backend::FastBackend) | `fast_image_resize`, Catmull-Rom |
//!
//! Everything else (crop, rotate, encode…) is shared between the two.

use super::params::{
    BackgroundArgs, CropArgs, FlipDirection, OutputFormat, Quality, ReflectionArgs, ResizeArgs,
    WatermarkArgs,
};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: one backend instance is shared by every
/// build a [`Thumbnailer`](crate::thumbnail::Thumbnailer) runs, including the
/// parallel builds of the `batch` command.
pub trait ImageBackend: Sync {
    /// Decode an image from disk.
    fn open(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    fn resize(&self, image: DynamicImage, args: &ResizeArgs) -> Result<DynamicImage, BackendError>;

    fn crop(&self, image: DynamicImage, args: &CropArgs) -> Result<DynamicImage, BackendError>;

    /// Rotate clockwise by `degrees`, expanding the canvas for oblique angles.
    fn rotate(&self, image: DynamicImage, degrees: f64) -> Result<DynamicImage, BackendError>;

    fn flip(
        &self,
        image: DynamicImage,
        direction: FlipDirection,
    ) -> Result<DynamicImage, BackendError>;

    /// Sharpen by `amount` (1–100).
    fn sharpen(&self, image: DynamicImage, amount: u8) -> Result<DynamicImage, BackendError>;

    fn reflection(
        &self,
        image: DynamicImage,
        args: &ReflectionArgs,
    ) -> Result<DynamicImage, BackendError>;

    fn watermark(
        &self,
        image: DynamicImage,
        mark: &DynamicImage,
        args: &WatermarkArgs,
    ) -> Result<DynamicImage, BackendError>;

    fn background(
        &self,
        image: DynamicImage,
        args: &BackgroundArgs,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode `image` and write it to `path`.
    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), BackendError>;

    /// Encode `image` into memory.
    fn render(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}

impl<T: ImageBackend + ?Sized> ImageBackend for Box<T> {
    fn open(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        (**self).open(path)
    }

    fn resize(&self, image: DynamicImage, args: &ResizeArgs) -> Result<DynamicImage, BackendError> {
        (**self).resize(image, args)
    }

    fn crop(&self, image: DynamicImage, args: &CropArgs) -> Result<DynamicImage, BackendError> {
        (**self).crop(image, args)
    }

    fn rotate(&self, image: DynamicImage, degrees: f64) -> Result<DynamicImage, BackendError> {
        (**self).rotate(image, degrees)
    }

    fn flip(
        &self,
        image: DynamicImage,
        direction: FlipDirection,
    ) -> Result<DynamicImage, BackendError> {
        (**self).flip(image, direction)
    }

    fn sharpen(&self, image: DynamicImage, amount: u8) -> Result<DynamicImage, BackendError> {
        (**self).sharpen(image, amount)
    }

    fn reflection(
        &self,
        image: DynamicImage,
        args: &ReflectionArgs,
    ) -> Result<DynamicImage, BackendError> {
        (**self).reflection(image, args)
    }

    fn watermark(
        &self,
        image: DynamicImage,
        mark: &DynamicImage,
        args: &WatermarkArgs,
    ) -> Result<DynamicImage, BackendError> {
        (**self).watermark(image, mark, args)
    }

    fn background(
        &self,
        image: DynamicImage,
        args: &BackgroundArgs,
    ) -> Result<DynamicImage, BackendError> {
        (**self).background(image, args)
    }

    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), BackendError> {
        (**self).save(image, path, format, quality)
    }

    fn render(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        (**self).render(image, format, quality)
    }
}
