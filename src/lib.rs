//! # thumbcache
//!
//! A caching thumbnail layer. A thumbnail is a source image plus an ordered
//! map of operations (`resize`, `crop`, `rotate`, `watermark`, …). The pair
//! is fingerprinted, the result is written once into a sharded cache
//! directory, and later requests for the same pair are served from disk
//! until the entry goes stale.
//!
//! ```no_run
//! use thumbcache::config::ThumbConfig;
//! use thumbcache::params::ParameterMap;
//! use thumbcache::thumbnail::Thumbnailer;
//!
//! let thumbs = Thumbnailer::from_config(ThumbConfig::default());
//! let params = ParameterMap::from_json(r#"{"resize": {"width": 300, "height": 200}}"#)?;
//! if let Some(url) = thumbs.thumbnail_url("/photos/dawn.jpg", &params, None)? {
//!     println!("{url}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Request Cycle
//!
//! ```text
//! (source, params, hash)
//!     │ key::fingerprint
//!     ▼
//! {cache_root}/{f}/{fingerprint}.{ext} ── fresh ──▶ URL
//!     │ stale or missing
//!     ▼
//! load source → interpreter::plan → interpreter::apply → store::persist
//!     │ retina_support and enough resolution
//!     ▼
//! {fingerprint}@2x.{ext}
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`params`] | Ordered parameter maps, JSON parsing, canonical serialization |
//! | [`interpreter`] | Validates a parameter map into a plan and runs it through a backend |
//! | [`key`] | SHA-256 fingerprint of (source, params, version) |
//! | [`store`] | Sharded cache layout, freshness, atomic writes, permission bits |
//! | [`thumbnail`] | The request state machine, retina variants, build locks, stateful editor |
//! | [`imaging`] | Backend trait plus the `image` and `fast` drivers |
//! | [`config`] | `thumbcache.toml` loading, validation, and merging onto stock defaults |
//! | [`batch`] | Parallel thumbnailing of a directory tree |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Order Is Part of the Key
//!
//! Operations are a program, not a set: `resize` then `crop` differs from
//! `crop` then `resize`. Parameter maps keep insertion order end to end
//! (`serde_json` with `preserve_order`), and the fingerprint hashes them as
//! written. Reordering keys produces a new cache entry.
//!
//! ## Validate Before Touching Pixels
//!
//! [`interpreter::plan`] checks every operation name and mandatory field and
//! produces typed arguments. Only a valid plan reaches the backend, so a typo
//! in the last operation never costs a decode.
//!
//! ## Unavailable Is Not an Error
//!
//! A missing or undecodable source yields
//! [`Lookup::Unavailable`](thumbnail::Lookup::Unavailable), logged at warn
//! level. Errors are reserved for bad parameters and failed writes, which a
//! caller has to act on.
//!
//! ## Pure-Rust Imaging
//!
//! Both drivers are built on the `image` crate; the `fast` driver swaps in
//! `fast_image_resize` for resampling. No system libraries are required.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod interpreter;
pub mod key;
pub mod output;
pub mod params;
pub mod store;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_helpers;
