//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images. Both
//! backends (and the test mock) call them, so every driver agrees on the
//! output size of a given plan.

use super::params::{CropArgs, Master, Offset, ResizeArgs};

/// Calculate the output size of a resize.
///
/// Rules, in order:
/// - no master means [`Master::Auto`]
/// - `Width`/`Height` with that side given drop the other side, so the given
///   side drives
/// - a missing side is taken from the source under [`Master::None`];
///   otherwise the present side becomes the master
/// - `Auto` fits inside the box (the side with the larger reduction drives),
///   `Inverse` covers it (the smaller reduction drives)
/// - results are rounded and never smaller than 1
///
/// # Examples
/// ```
/// # use thumbcache::imaging::calculations::resize_dimensions;
/// # use thumbcache::imaging::ResizeArgs;
/// let args = ResizeArgs { width: Some(500), height: Some(500), master: None };
/// assert_eq!(resize_dimensions((1000, 800), &args), (500, 400));
/// ```
pub fn resize_dimensions(source: (u32, u32), args: &ResizeArgs) -> (u32, u32) {
    let src_w = source.0.max(1) as f64;
    let src_h = source.1.max(1) as f64;

    let mut width = args.width.filter(|&w| w > 0).map(f64::from);
    let mut height = args.height.filter(|&h| h > 0).map(f64::from);
    let mut master = args.master.unwrap_or(Master::Auto);

    match master {
        Master::Width if width.is_some() => {
            master = Master::Auto;
            height = None;
        }
        Master::Height if height.is_some() => {
            master = Master::Auto;
            width = None;
        }
        _ => {}
    }

    if width.is_none() {
        if master == Master::None {
            width = Some(src_w);
        } else {
            master = Master::Height;
        }
    }
    if height.is_none() {
        if master == Master::None {
            height = Some(src_h);
        } else {
            master = Master::Width;
        }
    }

    let mut w = width.unwrap_or(src_w);
    let mut h = height.unwrap_or(src_h);

    master = match master {
        Master::Auto if src_w / w > src_h / h => Master::Width,
        Master::Auto => Master::Height,
        Master::Inverse if src_w / w > src_h / h => Master::Height,
        Master::Inverse => Master::Width,
        other => other,
    };

    match master {
        Master::Width => h = src_h * w / src_w,
        Master::Height => w = src_w * h / src_h,
        Master::Precise => {
            let ratio = src_w / src_h;
            if w / h > ratio {
                h = src_h * w / src_w;
            } else {
                w = src_w * h / src_h;
            }
        }
        _ => {}
    }

    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Resolve an [`Offset`] to a pixel position of `item` inside `container`.
///
/// The result may be negative (an item larger than its container, or a large
/// negative offset); callers clamp as their operation requires.
pub fn resolve_offset(container: u32, item: u32, offset: Offset) -> i64 {
    let free = container as i64 - item as i64;
    match offset {
        Offset::Center => (free as f64 / 2.0).round() as i64,
        Offset::End => free,
        Offset::Pixels(n) if n < 0 => free.saturating_add(n),
        Offset::Pixels(n) => n,
    }
}

/// A crop window inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate the crop window for `args` on an image of size `source`.
///
/// The requested size is clamped to the image, the offsets are resolved with
/// [`resolve_offset`], and the size is clamped to the space remaining after
/// the offset. An offset that leaves no space at all puts the window flush
/// against the far edge, so the rectangle always lies inside the image.
pub fn crop_rect(source: (u32, u32), args: &CropArgs) -> CropRect {
    let (src_w, src_h) = source;
    let (x, width) = crop_span(src_w, args.width, args.offset_x);
    let (y, height) = crop_span(src_h, args.height, args.offset_y);
    CropRect {
        x,
        y,
        width,
        height,
    }
}

/// Start and length of a crop window along one axis of length `extent`.
fn crop_span(extent: u32, requested: u32, offset: Offset) -> (u32, u32) {
    let extent = extent.max(1);
    let size = requested.clamp(1, extent);
    let start = resolve_offset(extent, size, offset).max(0);
    if start >= i64::from(extent) {
        return (extent - size, size);
    }
    let start = start as u32;
    (start, size.min(extent - start))
}

/// Bounding box of an image rotated by `degrees` around its center.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let normalized = degrees.rem_euclid(360.0);
    let near = |target: f64| (normalized - target).abs() < 0.001;

    if near(0.0) || near(360.0) || near(180.0) {
        return (width, height);
    }
    if near(90.0) || near(270.0) {
        return (height, width);
    }

    let rad = degrees.to_radians();
    let cos = rad.cos().abs();
    let sin = rad.sin().abs();
    let (w, h) = (width as f64, height as f64);

    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;
    (new_w.max(1), new_h.max(1))
}

/// Height of a reflection strip for an image `image_height` tall.
pub fn reflection_height(image_height: u32, requested: Option<u32>) -> u32 {
    match requested {
        Some(h) if h > 0 && h <= image_height => h,
        _ => image_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resize(w: Option<u32>, h: Option<u32>, master: Option<Master>) -> ResizeArgs {
        ResizeArgs {
            width: w,
            height: h,
            master,
        }
    }

    // =========================================================================
    // resize_dimensions
    // =========================================================================

    #[test]
    fn resize_auto_fits_inside_box() {
        assert_eq!(
            resize_dimensions((1000, 800), &resize(Some(500), Some(400), None)),
            (500, 400)
        );
        assert_eq!(
            resize_dimensions((1000, 800), &resize(Some(300), Some(300), None)),
            (300, 240)
        );
        assert_eq!(
            resize_dimensions((800, 1000), &resize(Some(300), Some(300), None)),
            (240, 300)
        );
    }

    #[test]
    fn resize_inverse_covers_box() {
        assert_eq!(
            resize_dimensions(
                (1000, 800),
                &resize(Some(300), Some(300), Some(Master::Inverse))
            ),
            (375, 300)
        );
    }

    #[test]
    fn resize_width_only_keeps_aspect() {
        assert_eq!(
            resize_dimensions((1000, 800), &resize(Some(250), None, None)),
            (250, 200)
        );
    }

    #[test]
    fn resize_height_only_keeps_aspect() {
        assert_eq!(
            resize_dimensions((1000, 800), &resize(None, Some(200), None)),
            (250, 200)
        );
    }

    #[test]
    fn resize_master_width_ignores_height() {
        assert_eq!(
            resize_dimensions(
                (1000, 800),
                &resize(Some(500), Some(100), Some(Master::Width))
            ),
            (500, 400)
        );
    }

    #[test]
    fn resize_none_stretches() {
        assert_eq!(
            resize_dimensions(
                (1000, 800),
                &resize(Some(100), Some(100), Some(Master::None))
            ),
            (100, 100)
        );
        // Missing side comes from the source
        assert_eq!(
            resize_dimensions((1000, 800), &resize(Some(100), None, Some(Master::None))),
            (100, 800)
        );
    }

    #[test]
    fn resize_precise_grows_to_cover() {
        assert_eq!(
            resize_dimensions(
                (1000, 800),
                &resize(Some(400), Some(400), Some(Master::Precise))
            ),
            (500, 400)
        );
    }

    #[test]
    fn resize_without_sides_is_identity() {
        assert_eq!(
            resize_dimensions((640, 480), &ResizeArgs::default()),
            (640, 480)
        );
    }

    #[test]
    fn resize_never_collapses_to_zero() {
        assert_eq!(
            resize_dimensions((10000, 10), &resize(Some(100), None, None)),
            (100, 1)
        );
    }

    // =========================================================================
    // Offsets and crop
    // =========================================================================

    #[test]
    fn offsets_resolve_against_free_space() {
        assert_eq!(resolve_offset(400, 100, Offset::Center), 150);
        assert_eq!(resolve_offset(400, 100, Offset::End), 300);
        assert_eq!(resolve_offset(400, 100, Offset::Pixels(20)), 20);
        assert_eq!(resolve_offset(400, 100, Offset::Pixels(-20)), 280);
    }

    #[test]
    fn crop_centered_by_default() {
        let rect = crop_rect(
            (375, 300),
            &CropArgs {
                width: 300,
                height: 300,
                offset_x: Offset::Center,
                offset_y: Offset::Center,
            },
        );
        assert_eq!(
            rect,
            CropRect {
                x: 38,
                y: 0,
                width: 300,
                height: 300
            }
        );
    }

    #[test]
    fn crop_larger_than_image_clamps() {
        let rect = crop_rect(
            (200, 100),
            &CropArgs {
                width: 500,
                height: 500,
                offset_x: Offset::Center,
                offset_y: Offset::Center,
            },
        );
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn crop_offset_near_edge_shrinks_window() {
        let rect = crop_rect(
            (200, 100),
            &CropArgs {
                width: 100,
                height: 50,
                offset_x: Offset::Pixels(150),
                offset_y: Offset::End,
            },
        );
        assert_eq!(
            rect,
            CropRect {
                x: 150,
                y: 50,
                width: 50,
                height: 50
            }
        );
    }

    #[test]
    fn crop_offset_past_edge_stays_inside_image() {
        for offset_x in [400, 401, 10_000] {
            let rect = crop_rect(
                (400, 300),
                &CropArgs {
                    width: 100,
                    height: 50,
                    offset_x: Offset::Pixels(offset_x),
                    offset_y: Offset::Center,
                },
            );
            assert_eq!(
                rect,
                CropRect {
                    x: 300,
                    y: 125,
                    width: 100,
                    height: 50
                },
                "offset_x = {offset_x}"
            );
        }
    }

    #[test]
    fn crop_negative_offset_past_origin_clamps_to_zero() {
        let rect = crop_rect(
            (400, 300),
            &CropArgs {
                width: 100,
                height: 50,
                offset_x: Offset::Pixels(-1000),
                offset_y: Offset::Pixels(i64::MIN),
            },
        );
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 100, 50));
    }

    #[test]
    fn extreme_negative_offset_saturates() {
        assert_eq!(
            resolve_offset(10, 50, Offset::Pixels(i64::MIN)),
            i64::MIN
        );
        assert_eq!(resolve_offset(400, 100, Offset::Pixels(i64::MIN)), i64::MIN + 300);
    }

    // =========================================================================
    // Rotation and reflection
    // =========================================================================

    #[test]
    fn rotated_bounds_right_angles() {
        assert_eq!(rotated_bounds(100, 50, 90.0), (50, 100));
        assert_eq!(rotated_bounds(100, 50, -90.0), (50, 100));
        assert_eq!(rotated_bounds(100, 50, 180.0), (100, 50));
        assert_eq!(rotated_bounds(100, 50, 720.0), (100, 50));
    }

    #[test]
    fn rotated_bounds_expand_for_oblique_angles() {
        let (w, h) = rotated_bounds(100, 100, 45.0);
        assert_eq!((w, h), (141, 141));
    }

    #[test]
    fn reflection_height_clamps() {
        assert_eq!(reflection_height(100, None), 100);
        assert_eq!(reflection_height(100, Some(40)), 40);
        assert_eq!(reflection_height(100, Some(400)), 100);
        assert_eq!(reflection_height(100, Some(0)), 100);
    }
}
