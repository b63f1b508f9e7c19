//! On-disk cache layout.
//!
//! Entries live under `{web_root}/{cache_path}`, sharded by the first
//! character of their fingerprint:
//!
//! ```text
//! assets/thumbs/
//! ├── 3/
//! │   ├── 3f9c…e1.jpg
//! │   └── 3f9c…e1@2x.jpg
//! └── a/
//!     └── a07b…44.png
//! ```
//!
//! Freshness is purely age based: an entry is fresh while
//! `now - mtime < cache_time`. Nothing here ever deletes an entry; eviction
//! belongs to whatever owns the disk.
//!
//! Writes go to a hidden temporary sibling (`.{name}.XXXXXX.tmp`) and are
//! renamed into place, so a concurrent reader sees either the old file or
//! the complete new one. Permission bits are best effort: a failed chmod is
//! logged and the build carries on.

use crate::config::ThumbConfig;
use crate::imaging::BackendError;
use log::warn;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to create temporary file in {dir}: {source}")]
    TempFile { dir: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: BackendError },
    #[error("failed to move {path} into place: {source}")]
    Rename { path: PathBuf, source: io::Error },
    #[error("failed to read cache directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Every location derived from one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    /// Shard directory.
    pub dir: PathBuf,
    pub file: PathBuf,
    pub retina_file: PathBuf,
    pub url: String,
    pub retina_url: String,
}

/// Name of the high-density variant of `{fingerprint}.{ext}`.
pub fn retina_name(fingerprint: &str, extension: &str) -> String {
    format!("{fingerprint}@2x.{extension}")
}

/// True iff `path` exists and was modified less than `max_age` ago.
pub fn is_fresh(path: &Path, max_age: Duration) -> bool {
    is_fresh_at(path, max_age, SystemTime::now())
}

/// [`is_fresh`] against an explicit clock. An mtime in the future counts as
/// age zero.
pub fn is_fresh_at(path: &Path, max_age: Duration, now: SystemTime) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    age < max_age
}

pub struct CacheStore {
    root: PathBuf,
    url_base: String,
    url_path: String,
    max_age: Duration,
    dir_mode: u32,
    file_mode: u32,
}

impl CacheStore {
    pub fn new(config: &ThumbConfig) -> Self {
        Self {
            root: config
                .web_root
                .join(config.cache_path.trim_start_matches('/')),
            url_base: config.base_url.trim_end_matches('/').to_string(),
            url_path: config.cache_path.trim_matches('/').to_string(),
            max_age: Duration::from_secs(config.cache_time),
            dir_mode: config.new_dir_mode,
            file_mode: config.new_file_mode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Compute the shard directory, file paths and public URLs.
    pub fn resolve(&self, fingerprint: &str, extension: &str) -> CachePaths {
        let shard: String = fingerprint.chars().take(1).collect();
        let file_name = format!("{fingerprint}.{extension}");
        let retina_file_name = retina_name(fingerprint, extension);
        let dir = self.root.join(&shard);

        CachePaths {
            file: dir.join(&file_name),
            retina_file: dir.join(&retina_file_name),
            url: self.public_url(&shard, &file_name),
            retina_url: self.public_url(&shard, &retina_file_name),
            dir,
        }
    }

    fn public_url(&self, shard: &str, file_name: &str) -> String {
        let path = [self.url_path.as_str(), shard, file_name]
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.url_base, path)
    }

    pub fn fresh(&self, path: &Path) -> bool {
        is_fresh(path, self.max_age)
    }

    /// Create the shard directory (and the cache root) if absent.
    ///
    /// Newly created directories get `new_dir_mode` on both root and shard,
    /// independent of the process umask.
    pub fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if dir.is_dir() {
            return Ok(());
        }
        create_dir_all(dir, self.dir_mode).map_err(|source| StoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        for path in [self.root.as_path(), dir] {
            if let Err(err) = set_mode(path, self.dir_mode) {
                warn!(
                    "could not set mode {:o} on {}: {err}",
                    self.dir_mode,
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Write an entry atomically.
    ///
    /// `write` receives a temporary path in the same directory as
    /// `final_path`. It is renamed over `final_path` only if `write`
    /// succeeds; otherwise the temporary file is removed.
    pub fn persist<F>(&self, final_path: &Path, write: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Path) -> Result<(), BackendError>,
    {
        let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|source| StoreError::TempFile {
                dir: dir.to_path_buf(),
                source,
            })?;

        write(tmp.path()).map_err(|source| StoreError::Write {
            path: final_path.to_path_buf(),
            source,
        })?;

        tmp.persist(final_path)
            .map_err(|e| StoreError::Rename {
                path: final_path.to_path_buf(),
                source: e.error,
            })?;

        self.finalize(final_path);
        Ok(())
    }

    /// Apply `new_file_mode`. Failure is logged and ignored: the entry is
    /// already in place and servable.
    pub fn finalize(&self, path: &Path) {
        if let Err(err) = set_mode(path, self.file_mode) {
            warn!(
                "could not set mode {:o} on {}: {err}",
                self.file_mode,
                path.display()
            );
        }
    }

    /// Walk the cache root and summarize what is there.
    pub fn inspect(&self) -> Result<CacheSummary, StoreError> {
        let mut summary = CacheSummary::default();
        if !self.root.is_dir() {
            return Ok(summary);
        }
        let now = SystemTime::now();

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let is_retina = entry
                .path()
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().ends_with("@2x"));
            if is_retina {
                summary.retina += 1;
            } else {
                summary.entries += 1;
            }
            if is_fresh_at(entry.path(), self.max_age, now) {
                summary.fresh += 1;
            } else {
                summary.stale += 1;
            }
            summary.bytes += entry.metadata()?.len();
        }
        Ok(summary)
    }
}

/// Counts reported by [`CacheStore::inspect`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheSummary {
    pub entries: u64,
    pub retina: u64,
    pub fresh: u64,
    pub stale: u64,
    pub bytes: u64,
}

impl fmt::Display for CacheSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries ({} @2x), {} fresh, {} stale, {} bytes",
            self.entries, self.retina, self.fresh, self.stale, self.bytes
        )
    }
}

#[cfg(unix)]
fn create_dir_all(dir: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(mode).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
