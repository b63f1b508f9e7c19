//! End-to-end thumbnailing through the public API with the real drivers.
//!
//! Every test works in its own temporary web root; nothing is shared.

use image::{GenericImageView, RgbImage};
use std::path::Path;
use tempfile::TempDir;
use thumbcache::config::{Driver, ThumbConfig};
use thumbcache::params::ParameterMap;
use thumbcache::thumbnail::{Lookup, Thumbnailer};

fn write_source(root: &Path, public: &str, width: u32, height: u32) {
    let path = root.join(public.trim_start_matches('/'));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    })
    .save(&path)
    .unwrap();
}

fn thumbnailer(root: &Path, driver: Driver, retina: bool) -> Thumbnailer {
    Thumbnailer::from_config(ThumbConfig {
        driver,
        web_root: root.to_path_buf(),
        retina_support: retina,
        ..ThumbConfig::default()
    })
}

fn params(json: &str) -> ParameterMap {
    ParameterMap::from_json(json).unwrap()
}

fn dimensions(path: &Path) -> (u32, u32) {
    image::open(path).unwrap().dimensions()
}

#[test]
fn builds_then_serves_from_cache() {
    for driver in [Driver::Image, Driver::Fast] {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "/photos/dawn.jpg", 640, 480);
        let thumbs = thumbnailer(tmp.path(), driver, false);
        let params = params(r#"{"resize": {"width": 320, "height": 240}, "quality": 80}"#);

        let thumb = match thumbs.thumbnail("/photos/dawn.jpg", &params, None).unwrap() {
            Lookup::Built(thumb) => thumb,
            other => panic!("expected a fresh build, got {other:?}"),
        };
        assert!(thumb.url.starts_with("/assets/thumbs/"));
        assert!(thumb.url.ends_with(".jpg"));
        assert!(thumb.path.starts_with(tmp.path().join("assets/thumbs")));
        assert_eq!(dimensions(&thumb.path), (320, 240));
        assert!(thumb.retina.is_none());

        let second = thumbs.thumbnail("/photos/dawn.jpg", &params, None).unwrap();
        assert!(matches!(second, Lookup::Cached(ref t) if t.url == thumb.url));
    }
}

#[test]
fn retina_variant_has_double_size() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/wide.jpg", 1000, 800);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, true);
    let params = params(r#"{"resize": {"width": 500, "height": 400}}"#);

    let lookup = thumbs.thumbnail("/photos/wide.jpg", &params, None).unwrap();
    let thumb = lookup.thumbnail().unwrap();
    let retina = thumb.retina.as_ref().unwrap();

    assert_eq!(dimensions(&thumb.path), (500, 400));
    assert_eq!(dimensions(retina), (1000, 800));
    assert!(thumb.retina_url.as_ref().unwrap().ends_with("@2x.jpg"));
}

#[test]
fn small_source_gets_no_retina_variant() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/small.jpg", 600, 400);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, true);
    let params = params(r#"{"resize": {"width": 500, "height": 400}}"#);

    let lookup = thumbs.thumbnail("/photos/small.jpg", &params, None).unwrap();
    let thumb = lookup.thumbnail().unwrap();
    assert!(thumb.retina.is_none());
    assert!(thumb.retina_url.is_none());
}

#[test]
fn type_selects_output_format() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 200, 100);
    let thumbs = thumbnailer(tmp.path(), Driver::Fast, false);
    let params = params(r#"{"resize": {"width": 100}, "type": "png"}"#);

    let url = thumbs
        .thumbnail_url("/photos/dawn.jpg", &params, None)
        .unwrap()
        .unwrap();
    assert!(url.ends_with(".png"));

    let path = tmp.path().join(url.trim_start_matches('/'));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
    assert_eq!(dimensions(&path), (100, 50));
}

#[test]
fn version_hash_changes_the_url() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 200, 100);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);
    let params = params(r#"{"resize": {"width": 100}}"#);

    let plain = thumbs.thumbnail_url("/photos/dawn.jpg", &params, None).unwrap();
    let versioned = thumbs
        .thumbnail_url("/photos/dawn.jpg", &params, Some("v2"))
        .unwrap();
    assert_ne!(plain, versioned);
}

#[test]
fn render_returns_encoded_bytes_without_caching() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 300, 200);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);
    let params = params(r#"{"crop": {"width": 120, "height": 80}, "type": "png"}"#);

    let bytes = thumbs
        .render_thumbnail("/photos/dawn.jpg", &params)
        .unwrap()
        .unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (120, 80));
    assert!(!tmp.path().join("assets/thumbs").exists());
}

#[test]
fn missing_source_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);
    let params = params(r#"{"resize": {"width": 100}}"#);

    let lookup = thumbs.thumbnail("/photos/nope.jpg", &params, None).unwrap();
    assert!(matches!(lookup, Lookup::Unavailable));
    assert!(
        thumbs
            .render_thumbnail("/photos/nope.jpg", &params)
            .unwrap()
            .is_none()
    );
}

#[test]
fn unknown_operation_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 200, 100);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);

    let result = thumbs.thumbnail("/photos/dawn.jpg", &params(r#"{"sepia": 1}"#), None);
    assert!(result.is_err());
}

#[test]
fn crop_offset_at_far_edge_builds_full_window() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 400, 300);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);
    let params = params(r#"{"crop": {"width": 100, "height": 50, "offset_x": 400}, "resize": {"width": 50}}"#);

    let lookup = thumbs.thumbnail("/photos/dawn.jpg", &params, None).unwrap();
    let thumb = lookup.thumbnail().unwrap();
    assert_eq!(dimensions(&thumb.path), (50, 25));
}

#[test]
fn oversized_resize_is_rejected_before_decoding() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "/photos/dawn.jpg", 40, 30);
    let thumbs = thumbnailer(tmp.path(), Driver::Image, false);
    let params = params(r#"{"resize": {"width": 100000, "height": 100000, "master": 1}}"#);

    assert!(thumbs.render_thumbnail("/photos/dawn.jpg", &params).is_err());
}
