//! SIMD resize backend (driver `fast`).
//!
//! Resizing goes through `fast_image_resize` (convolution, Catmull-Rom) on an
//! RGBA8 buffer. Every other operation is shared with
//! [`RustBackend`](super::rust_backend::RustBackend); the geometry is the same
//! because both sides size their output with
//! [`resize_dimensions`](super::calculations::resize_dimensions).

use super::backend::{BackendError, ImageBackend};
use super::calculations::resize_dimensions;
use super::params::{
    BackgroundArgs, CropArgs, FlipDirection, OutputFormat, Quality, ReflectionArgs, ResizeArgs,
    WatermarkArgs,
};
use super::rust_backend::RustBackend;
use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};
use std::path::Path;

pub struct FastBackend {
    shared: RustBackend,
}

impl FastBackend {
    pub fn new() -> Self {
        Self {
            shared: RustBackend::new(),
        }
    }

    fn resize_rgba(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<DynamicImage, BackendError> {
        let src = image.to_rgba8();
        let (src_width, src_height) = src.dimensions();

        let src_image =
            fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
                .map_err(|e| {
                    BackendError::ProcessingFailed(format!("Failed to wrap source buffer: {e}"))
                })?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| BackendError::ProcessingFailed(format!("fast resize failed: {e}")))?;

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            target_width,
            target_height,
            dst_image.into_vec(),
        )
        .ok_or_else(|| BackendError::ProcessingFailed("fast resize buffer size mismatch".into()))?;

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

impl Default for FastBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for FastBackend {
    fn open(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        self.shared.open(path)
    }

    fn resize(&self, image: DynamicImage, args: &ResizeArgs) -> Result<DynamicImage, BackendError> {
        let (width, height) = resize_dimensions((image.width(), image.height()), args);
        match Self::resize_rgba(&image, width, height) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("fast resize failed, falling back to resize_exact: {err}");
                Ok(image.resize_exact(width, height, FilterType::CatmullRom))
            }
        }
    }

    fn crop(&self, image: DynamicImage, args: &CropArgs) -> Result<DynamicImage, BackendError> {
        self.shared.crop(image, args)
    }

    fn rotate(&self, image: DynamicImage, degrees: f64) -> Result<DynamicImage, BackendError> {
        self.shared.rotate(image, degrees)
    }

    fn flip(
        &self,
        image: DynamicImage,
        direction: FlipDirection,
    ) -> Result<DynamicImage, BackendError> {
        self.shared.flip(image, direction)
    }

    fn sharpen(&self, image: DynamicImage, amount: u8) -> Result<DynamicImage, BackendError> {
        self.shared.sharpen(image, amount)
    }

    fn reflection(
        &self,
        image: DynamicImage,
        args: &ReflectionArgs,
    ) -> Result<DynamicImage, BackendError> {
        self.shared.reflection(image, args)
    }

    fn watermark(
        &self,
        image: DynamicImage,
        mark: &DynamicImage,
        args: &WatermarkArgs,
    ) -> Result<DynamicImage, BackendError> {
        self.shared.watermark(image, mark, args)
    }

    fn background(
        &self,
        image: DynamicImage,
        args: &BackgroundArgs,
    ) -> Result<DynamicImage, BackendError> {
        self.shared.background(image, args)
    }

    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), BackendError> {
        self.shared.save(image, path, format, quality)
    }

    fn render(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        self.shared.render(image, format, quality)
    }
}
