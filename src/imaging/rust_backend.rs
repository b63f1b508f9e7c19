//! Pure Rust image processing backend (driver `image`).
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Rotate | `rotate90/180/270`, inverse mapping for other angles |
//! | Flip | `fliph` / `flipv` |
//! | Sharpen | `DynamicImage::unsharpen` |
//! | Watermark / background | `image::imageops::overlay` |
//! | Encode | `image` encoders; AVIF via rav1e (speed 6) |

use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    crop_rect, reflection_height, resize_dimensions, resolve_offset, rotated_bounds,
};
use super::params::{
    BackgroundArgs, CropArgs, FlipDirection, OutputFormat, Quality, ReflectionArgs, ResizeArgs,
    WatermarkArgs,
};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Unsharp-mask sigma per unit of sharpen amount (amount 100 → sigma 5.0).
const SHARPEN_SIGMA_PER_AMOUNT: f32 = 0.05;

/// rav1e speed preset for AVIF output.
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale every alpha value of `image` by `opacity` percent.
fn scale_alpha(image: &mut RgbaImage, opacity: u8) {
    if opacity >= 100 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as u32 * opacity as u32 / 100) as u8;
    }
}

/// Rotate clockwise by an arbitrary angle onto a transparent, expanded canvas.
fn rotate_free(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let src = image.to_rgba8();
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = rotated_bounds(src_w, src_h, degrees);

    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    let src_cx = src_w as f64 / 2.0;
    let src_cy = src_h as f64 / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let output = RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // Inverse of a clockwise rotation in y-down image space
        let sx = (dx * cos + dy * sin + src_cx).floor();
        let sy = (-dx * sin + dy * cos + src_cy).floor();
        if sx < 0.0 || sy < 0.0 || sx >= src_w as f64 || sy >= src_h as f64 {
            Rgba([0, 0, 0, 0])
        } else {
            *src.get_pixel(sx as u32, sy as u32)
        }
    });
    DynamicImage::ImageRgba8(output)
}

/// Encode `image` as `format` into `writer`.
pub(crate) fn encode<W: Write + Seek>(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
    writer: &mut W,
) -> Result<(), BackendError> {
    let q = quality.value().max(1);
    let result = match format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(writer, q)),
        OutputFormat::Avif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(AvifEncoder::new_with_speed_quality(writer, AVIF_SPEED, q)),
        OutputFormat::Png => image.write_to(writer, ImageFormat::Png),
        OutputFormat::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(writer, ImageFormat::Gif)
        }
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(writer, ImageFormat::WebP)
        }
        OutputFormat::Tiff => image.write_to(writer, ImageFormat::Tiff),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{format:?} encode failed: {e}")))
}

impl ImageBackend for RustBackend {
    fn open(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    fn resize(&self, image: DynamicImage, args: &ResizeArgs) -> Result<DynamicImage, BackendError> {
        let (width, height) = resize_dimensions((image.width(), image.height()), args);
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn crop(&self, image: DynamicImage, args: &CropArgs) -> Result<DynamicImage, BackendError> {
        let rect = crop_rect((image.width(), image.height()), args);
        Ok(image.crop_imm(rect.x, rect.y, rect.width, rect.height))
    }

    fn rotate(&self, image: DynamicImage, degrees: f64) -> Result<DynamicImage, BackendError> {
        let normalized = degrees.rem_euclid(360.0);
        let near = |target: f64| (normalized - target).abs() < 0.001;
        Ok(if near(0.0) || near(360.0) {
            image
        } else if near(90.0) {
            image.rotate90()
        } else if near(180.0) {
            image.rotate180()
        } else if near(270.0) {
            image.rotate270()
        } else {
            rotate_free(&image, degrees)
        })
    }

    fn flip(
        &self,
        image: DynamicImage,
        direction: FlipDirection,
    ) -> Result<DynamicImage, BackendError> {
        Ok(match direction {
            FlipDirection::Horizontal => image.fliph(),
            FlipDirection::Vertical => image.flipv(),
        })
    }

    fn sharpen(&self, image: DynamicImage, amount: u8) -> Result<DynamicImage, BackendError> {
        let sigma = amount.clamp(1, 100) as f32 * SHARPEN_SIGMA_PER_AMOUNT;
        Ok(image.unsharpen(sigma, 0))
    }

    fn reflection(
        &self,
        image: DynamicImage,
        args: &ReflectionArgs,
    ) -> Result<DynamicImage, BackendError> {
        let src = image.to_rgba8();
        let (width, height) = src.dimensions();
        let strip = reflection_height(height, args.height);

        let mut canvas = RgbaImage::new(width, height + strip);
        image::imageops::replace(&mut canvas, &src, 0, 0);

        let opacity = args.opacity.min(100) as u32;
        for offset in 0..strip {
            let fade = if args.fade_in {
                opacity * offset / strip
            } else {
                opacity * (strip - offset) / strip
            };
            let src_y = height - 1 - offset;
            for x in 0..width {
                let mut pixel = *src.get_pixel(x, src_y);
                pixel[3] = (pixel[3] as u32 * fade / 100) as u8;
                canvas.put_pixel(x, height + offset, pixel);
            }
        }
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn watermark(
        &self,
        image: DynamicImage,
        mark: &DynamicImage,
        args: &WatermarkArgs,
    ) -> Result<DynamicImage, BackendError> {
        let mut base = image.to_rgba8();
        let mut overlay = mark.to_rgba8();
        scale_alpha(&mut overlay, args.opacity);

        // Anything beyond these bounds is fully off canvas.
        let x = resolve_offset(base.width(), overlay.width(), args.offset_x)
            .clamp(-i64::from(overlay.width()), i64::from(base.width()));
        let y = resolve_offset(base.height(), overlay.height(), args.offset_y)
            .clamp(-i64::from(overlay.height()), i64::from(base.height()));
        image::imageops::overlay(&mut base, &overlay, x, y);
        Ok(DynamicImage::ImageRgba8(base))
    }

    fn background(
        &self,
        image: DynamicImage,
        args: &BackgroundArgs,
    ) -> Result<DynamicImage, BackendError> {
        let alpha = (args.opacity.min(100) as u32 * 255 / 100) as u8;
        let fill = Rgba([args.color.r, args.color.g, args.color.b, alpha]);
        let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), fill);
        image::imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), BackendError> {
        let file = std::fs::File::create(path).map_err(BackendError::Io)?;
        let mut writer = std::io::BufWriter::new(file);
        encode(image, format, quality, &mut writer)?;
        writer.flush().map_err(BackendError::Io)
    }

    fn render(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        encode(image, format, quality, &mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Color, Offset};
    use crate::test_helpers::{create_test_jpeg, gradient};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "gif", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn open_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let image = RustBackend::new().open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (200, 150));
    }

    #[test]
    fn open_nonexistent_file_errors() {
        let result = RustBackend::new().open(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn open_garbage_is_processing_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = RustBackend::new().open(&path);
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn resize_uses_shared_geometry() {
        let out = RustBackend::new()
            .resize(
                gradient(400, 300),
                &ResizeArgs {
                    width: Some(200),
                    height: Some(200),
                    master: None,
                },
            )
            .unwrap();
        assert_eq!((out.width(), out.height()), (200, 150));
    }

    #[test]
    fn crop_returns_requested_window() {
        let out = RustBackend::new()
            .crop(
                gradient(400, 300),
                &CropArgs {
                    width: 100,
                    height: 50,
                    offset_x: Offset::Pixels(10),
                    offset_y: Offset::End,
                },
            )
            .unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
        // Gradient encodes x in red, y in green
        let pixel = out.to_rgba8().get_pixel(0, 0).0;
        assert_eq!(pixel[0], 10);
        assert_eq!(pixel[1], 250);
    }

    #[test]
    fn crop_offset_at_or_past_edge_keeps_full_window() {
        for offset_x in [400, 1000] {
            let out = RustBackend::new()
                .crop(
                    gradient(400, 300),
                    &CropArgs {
                        width: 100,
                        height: 50,
                        offset_x: Offset::Pixels(offset_x),
                        offset_y: Offset::Pixels(0),
                    },
                )
                .unwrap();
            assert_eq!((out.width(), out.height()), (100, 50));
            assert_eq!(out.to_rgba8().get_pixel(0, 0).0[0], 44); // 300 % 256
        }
    }

    #[test]
    fn crop_past_edge_then_encodes() {
        let backend = RustBackend::new();
        let out = backend
            .crop(
                gradient(400, 300),
                &CropArgs {
                    width: 100,
                    height: 50,
                    offset_x: Offset::Pixels(400),
                    offset_y: Offset::Center,
                },
            )
            .unwrap();
        let bytes = backend
            .render(&out, OutputFormat::Jpeg, Quality::new(90))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn rotate_right_angle_swaps_dimensions() {
        let out = RustBackend::new().rotate(gradient(40, 20), 90.0).unwrap();
        assert_eq!((out.width(), out.height()), (20, 40));

        let out = RustBackend::new().rotate(gradient(40, 20), -90.0).unwrap();
        assert_eq!((out.width(), out.height()), (20, 40));
    }

    #[test]
    fn rotate_oblique_expands_canvas_with_transparent_corners() {
        let out = RustBackend::new().rotate(gradient(100, 100), 45.0).unwrap();
        assert_eq!((out.width(), out.height()), (141, 141));
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[3], 0);
        assert_eq!(out.to_rgba8().get_pixel(70, 70).0[3], 255);
    }

    #[test]
    fn flip_horizontal_mirrors_columns() {
        let out = RustBackend::new()
            .flip(gradient(50, 10), FlipDirection::Horizontal)
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[0], 49);
    }

    #[test]
    fn reflection_adds_strip() {
        let out = RustBackend::new()
            .reflection(
                gradient(20, 40),
                &ReflectionArgs {
                    height: Some(10),
                    opacity: 100,
                    fade_in: false,
                },
            )
            .unwrap();
        assert_eq!((out.width(), out.height()), (20, 50));
        let rgba = out.to_rgba8();
        // First reflected row mirrors the last source row at full opacity
        assert_eq!(rgba.get_pixel(0, 40).0[1], 39);
        assert_eq!(rgba.get_pixel(0, 40).0[3], 255);
        assert!(rgba.get_pixel(0, 49).0[3] < 30);
    }

    #[test]
    fn watermark_is_centered_by_default() {
        let mark = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255])));
        let out = RustBackend::new()
            .watermark(gradient(100, 100), &mark, &WatermarkArgs::default())
            .unwrap();
        let rgba = out.to_rgba8();
        assert_eq!(rgba.get_pixel(50, 50).0, [0, 0, 255, 255]);
        assert_ne!(rgba.get_pixel(10, 10).0, [0, 0, 255, 255]);
    }

    #[test]
    fn watermark_with_extreme_offset_falls_off_canvas() {
        let mark = DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 50, Rgba([0, 0, 255, 255])));
        let base = gradient(10, 10);
        let expected = base.to_rgba8();
        for offset in [i64::MIN, i64::MAX] {
            let out = RustBackend::new()
                .watermark(
                    base.clone(),
                    &mark,
                    &WatermarkArgs {
                        offset_x: Offset::Pixels(offset),
                        ..WatermarkArgs::default()
                    },
                )
                .unwrap();
            assert_eq!(out.to_rgba8(), expected);
        }
    }

    #[test]
    fn background_fills_transparency() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let out = RustBackend::new()
            .background(
                clear,
                &BackgroundArgs {
                    color: Color { r: 255, g: 0, b: 0 },
                    opacity: 100,
                },
            )
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn save_and_reopen_each_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();
        for (ext, format) in [
            ("jpg", OutputFormat::Jpeg),
            ("png", OutputFormat::Png),
            ("gif", OutputFormat::Gif),
            ("webp", OutputFormat::WebP),
            ("tiff", OutputFormat::Tiff),
        ] {
            let path = tmp.path().join(format!("out.{ext}"));
            backend
                .save(&gradient(64, 48), &path, format, Quality::new(80))
                .unwrap();
            let back = backend.open(&path).unwrap();
            assert_eq!((back.width(), back.height()), (64, 48), "{ext}");
        }
    }

    #[test]
    fn save_avif_writes_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.avif");
        RustBackend::new()
            .save(&gradient(32, 32), &path, OutputFormat::Avif, Quality::new(60))
            .unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn render_produces_decodable_png() {
        let bytes = RustBackend::new()
            .render(&gradient(30, 20), OutputFormat::Png, Quality::default())
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }
}
