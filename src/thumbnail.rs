//! Thumbnail orchestration.
//!
//! [`Thumbnailer::thumbnail`] is the whole request cycle:
//!
//! ```text
//! fingerprint → resolve paths → fresh? ──yes──▶ Cached
//!                                  │no
//!                      build permit, fresh again? ──yes──▶ Cached
//!                                  │no
//!        ensure dir → load source ──missing──▶ Unavailable
//!                                  │
//!            plan → apply → persist (atomic) → @2x variant → Built
//! ```
//!
//! ## Retina variants
//!
//! With `retina_support` on, a build whose result fits twice into the source
//! (`w*2 <= orig_w` and `h*2 <= orig_h`) gets a second file next to it,
//! `{fingerprint}@2x.{ext}`. The variant replays the parameters against the
//! untouched source. Only an explicit `resize` that names both `width` and
//! `height` is doubled; a thumbnail shaped by `crop` or `scaleAndCrop` alone
//! replays unchanged and the `@2x` file comes out the same size as the
//! primary. A failed variant is logged and never fails the request.
//!
//! ## Concurrency
//!
//! [`Thumbnailer`] is `Sync`. Builds of the same fingerprint are serialized
//! by [`BuildLocks`]; the loser of the race finds a fresh entry after the
//! permit is granted and serves it.

use crate::config::ThumbConfig;
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, OutputFormat, Quality, backend_for,
};
use crate::interpreter::{self, InterpretError, Plan, ValidationError, locate};
use crate::key::fingerprint;
use crate::params::{Param, ParameterMap, SharedImage, Value};
use crate::store::{CachePaths, CacheStore, StoreError};
use image::DynamicImage;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Extension used when neither `type` nor the source names one.
const FALLBACK_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum ThumbError {
    #[error("invalid parameters: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no image loaded")]
    NoImageLoaded,
}

impl From<InterpretError> for ThumbError {
    fn from(err: InterpretError) -> Self {
        match err {
            InterpretError::Validation(e) => ThumbError::Validation(e),
            InterpretError::Backend(e) => ThumbError::Backend(e),
        }
    }
}

/// A servable cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    pub path: PathBuf,
    pub retina_url: Option<String>,
    pub retina: Option<PathBuf>,
}

/// Outcome of a thumbnail request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Served from a fresh entry; nothing was built.
    Cached(Thumbnail),
    Built(Thumbnail),
    /// The source is missing or could not be decoded.
    Unavailable,
}

impl Lookup {
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        match self {
            Lookup::Cached(t) | Lookup::Built(t) => Some(t),
            Lookup::Unavailable => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.thumbnail().map(|t| t.url.as_str())
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            Lookup::Cached(t) | Lookup::Built(t) => Some(t.url),
            Lookup::Unavailable => None,
        }
    }
}

/// Per-fingerprint build permits.
///
/// Slots are created on demand and removed by the last holder.
#[derive(Default)]
pub struct BuildLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the permit for `key`.
    pub fn with_permit<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let result = {
            let _permit = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under the map lock, so two references (the
        // map's and ours) means nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        result
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a result leaves room for a 2x variant of the source.
pub fn retina_eligible(original: Dimensions, result: Dimensions) -> bool {
    u64::from(result.width) * 2 <= u64::from(original.width)
        && u64::from(result.height) * 2 <= u64::from(original.height)
}

/// Parameters for the `@2x` build: a `resize` naming both sides is set to
/// twice the primary result, everything else is replayed as is.
pub fn retina_params(params: &ParameterMap, result: Dimensions) -> ParameterMap {
    let mut params = params.clone();
    if let Some(Param::Structured(args)) = params.get_mut("resize")
        && args.present("width").is_some()
        && args.present("height").is_some()
    {
        args.insert("width", result.width.saturating_mul(2));
        args.insert("height", result.height.saturating_mul(2));
    }
    params
}

/// Lowercased extension without a leading dot.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Extension of the cache file: the `type` parameter, else the source's.
fn output_extension(source: &str, params: &ParameterMap) -> String {
    if let Some(Param::Scalar(Value::Text(ext))) = params.get("type") {
        return normalize_extension(ext);
    }
    Path::new(source)
        .extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

fn output_format(plan: &Plan, extension: &str) -> Result<OutputFormat, ValidationError> {
    plan.format()
        .or_else(|| OutputFormat::from_extension(extension))
        .ok_or_else(|| ValidationError::UnsupportedFormat(extension.to_string()))
}

pub struct Thumbnailer<B: ImageBackend = Box<dyn ImageBackend>> {
    backend: B,
    config: ThumbConfig,
    store: CacheStore,
    locks: BuildLocks,
}

impl Thumbnailer {
    /// Build with the backend named by `config.driver`.
    pub fn from_config(config: ThumbConfig) -> Self {
        Self::new(backend_for(config.driver), config)
    }
}

impl<B: ImageBackend> Thumbnailer<B> {
    pub fn new(backend: B, config: ThumbConfig) -> Self {
        Self {
            store: CacheStore::new(&config),
            backend,
            config,
            locks: BuildLocks::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ThumbConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Serve or build the thumbnail of `source` under `params`.
    ///
    /// `source` is a public path, looked up under the web root first. It
    /// enters the fingerprint exactly as given, together with `hash`
    /// (typically a content version).
    pub fn thumbnail(
        &self,
        source: &str,
        params: &ParameterMap,
        hash: Option<&str>,
    ) -> Result<Lookup, ThumbError> {
        let key = fingerprint(source, params, hash);
        let extension = output_extension(source, params);
        let paths = self.store.resolve(&key, &extension);

        if self.store.fresh(&paths.file) {
            debug!("cache hit {} for {source}", paths.url);
            return Ok(Lookup::Cached(served(&paths)));
        }

        self.locks.with_permit(&key, || {
            if self.store.fresh(&paths.file) {
                debug!("cache hit {} for {source} after waiting", paths.url);
                return Ok(Lookup::Cached(served(&paths)));
            }
            debug!("cache miss {} for {source}", paths.url);
            self.build(source, params, &paths, &extension)
        })
    }

    /// [`thumbnail`](Self::thumbnail), reduced to the URL of the 1x variant.
    pub fn thumbnail_url(
        &self,
        source: &str,
        params: &ParameterMap,
        hash: Option<&str>,
    ) -> Result<Option<String>, ThumbError> {
        Ok(self.thumbnail(source, params, hash)?.into_url())
    }

    /// Transform `source` and return the encoded bytes without touching the
    /// cache. `None` if the source is unavailable.
    pub fn render_thumbnail(
        &self,
        source: &str,
        params: &ParameterMap,
    ) -> Result<Option<Vec<u8>>, ThumbError> {
        let plan = interpreter::plan(params)?;
        let format = output_format(&plan, &output_extension(source, params))?;
        let Some(image) = self.load(source) else {
            return Ok(None);
        };
        let image = interpreter::apply(&self.backend, image, &plan, &self.config.web_root)?;
        let quality = plan.quality.unwrap_or(Quality::new(self.config.quality));
        Ok(Some(self.backend.render(&image, format, quality)?))
    }

    /// A stateful editor on this thumbnailer's backend.
    pub fn editor(&self) -> Editor<'_, B> {
        Editor::new(
            &self.backend,
            &self.config.web_root,
            Quality::new(self.config.quality),
        )
    }

    fn load(&self, source: &str) -> Option<DynamicImage> {
        let path = locate(&self.config.web_root, source);
        if !path.is_file() {
            warn!("thumbnail source {source} not found");
            return None;
        }
        match self.backend.open(&path) {
            Ok(image) => Some(image),
            Err(err) => {
                warn!("thumbnail source {} unreadable: {err}", path.display());
                None
            }
        }
    }

    fn build(
        &self,
        source: &str,
        params: &ParameterMap,
        paths: &CachePaths,
        extension: &str,
    ) -> Result<Lookup, ThumbError> {
        self.store.ensure_dir(&paths.dir)?;

        let Some(original) = self.load(source) else {
            return Ok(Lookup::Unavailable);
        };
        let original_dims = Dimensions::of(&original);

        let plan = interpreter::plan(params)?;
        let format = output_format(&plan, extension)?;
        let quality = plan.quality.unwrap_or(Quality::new(self.config.quality));

        let retina_source = self.config.retina_support.then(|| original.clone());
        let image = interpreter::apply(&self.backend, original, &plan, &self.config.web_root)?;
        let result_dims = Dimensions::of(&image);

        self.store.persist(&paths.file, |tmp| {
            self.backend.save(&image, tmp, format, quality)
        })?;
        drop(image);
        info!(
            "built {} ({}x{}) from {source}",
            paths.file.display(),
            result_dims.width,
            result_dims.height
        );

        let mut thumbnail = Thumbnail {
            url: paths.url.clone(),
            path: paths.file.clone(),
            retina_url: None,
            retina: None,
        };

        if let Some(original) = retina_source
            && retina_eligible(original_dims, result_dims)
        {
            match self.build_retina(original, params, result_dims, paths, format, quality) {
                Ok(()) => {
                    thumbnail.retina_url = Some(paths.retina_url.clone());
                    thumbnail.retina = Some(paths.retina_file.clone());
                }
                Err(err) => warn!(
                    "retina variant {} failed: {err}",
                    paths.retina_file.display()
                ),
            }
        }

        Ok(Lookup::Built(thumbnail))
    }

    fn build_retina(
        &self,
        original: DynamicImage,
        params: &ParameterMap,
        result: Dimensions,
        paths: &CachePaths,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<(), ThumbError> {
        let plan = interpreter::plan(&retina_params(params, result))?;
        let image = interpreter::apply(&self.backend, original, &plan, &self.config.web_root)?;
        self.store.persist(&paths.retina_file, |tmp| {
            self.backend.save(&image, tmp, format, quality)
        })?;
        info!(
            "built {} ({}x{})",
            paths.retina_file.display(),
            image.width(),
            image.height()
        );
        Ok(())
    }
}

fn served(paths: &CachePaths) -> Thumbnail {
    let has_retina = paths.retina_file.is_file();
    Thumbnail {
        url: paths.url.clone(),
        path: paths.file.clone(),
        retina_url: has_retina.then(|| paths.retina_url.clone()),
        retina: has_retina.then(|| paths.retina_file.clone()),
    }
}

/// Direct, uncached image manipulation.
///
/// Holds at most one working image. Everything except [`open`](Self::open)
/// and [`load`](Self::load) fails with [`ThumbError::NoImageLoaded`] until an
/// image is present.
pub struct Editor<'a, B: ImageBackend + ?Sized> {
    backend: &'a B,
    web_root: &'a Path,
    quality: Quality,
    image: Option<DynamicImage>,
}

impl<'a, B: ImageBackend + ?Sized> Editor<'a, B> {
    pub fn new(backend: &'a B, web_root: &'a Path, quality: Quality) -> Self {
        Self {
            backend,
            web_root,
            quality,
            image: None,
        }
    }

    /// Open `path` (a public path or a filesystem path) as the working image.
    pub fn open(&mut self, path: &str) -> Result<&mut Self, ThumbError> {
        self.image = Some(self.backend.open(&locate(self.web_root, path))?);
        Ok(self)
    }

    pub fn load(&mut self, image: DynamicImage) -> &mut Self {
        self.image = Some(image);
        self
    }

    /// Run `params` on the working image. A `quality` entry becomes the
    /// editor's quality for later saves and renders.
    ///
    /// Parameters are validated before the image is touched; a backend
    /// failure mid-way drops the working image.
    pub fn apply(&mut self, params: &ParameterMap) -> Result<&mut Self, ThumbError> {
        if self.image.is_none() {
            return Err(ThumbError::NoImageLoaded);
        }
        let plan = interpreter::plan(params)?;
        let image = self.image.take().ok_or(ThumbError::NoImageLoaded)?;
        self.image = Some(interpreter::apply(self.backend, image, &plan, self.web_root)?);
        if let Some(quality) = plan.quality {
            self.quality = quality;
        }
        Ok(self)
    }

    pub fn image(&self) -> Result<&DynamicImage, ThumbError> {
        self.image.as_ref().ok_or(ThumbError::NoImageLoaded)
    }

    pub fn dimensions(&self) -> Result<Dimensions, ThumbError> {
        self.image().map(Dimensions::of)
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Encode to `path`, choosing the format from its extension.
    pub fn save(&self, path: &Path) -> Result<(), ThumbError> {
        let image = self.image()?;
        let extension = path
            .extension()
            .map(|ext| normalize_extension(&ext.to_string_lossy()))
            .unwrap_or_default();
        let format = OutputFormat::from_extension(&extension)
            .ok_or(ValidationError::UnsupportedFormat(extension))?;
        Ok(self.backend.save(image, path, format, self.quality)?)
    }

    pub fn render(&self, format: OutputFormat) -> Result<Vec<u8>, ThumbError> {
        Ok(self.backend.render(self.image()?, format, self.quality)?)
    }

    /// Give up the working image for use as a `watermark` value.
    pub fn into_watermark(self) -> Result<SharedImage, ThumbError> {
        self.image
            .map(SharedImage::new)
            .ok_or(ThumbError::NoImageLoaded)
    }
}
