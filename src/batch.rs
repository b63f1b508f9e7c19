//! Bulk thumbnailing of a directory tree.
//!
//! [`collect_sources`] finds every decodable image below a directory and
//! turns it into the public path the fingerprint is computed over;
//! [`run_batch`] feeds them through a [`Thumbnailer`] in parallel with rayon.
//! Progress is reported per source over an optional channel so the CLI can
//! print while workers are still busy.

use crate::imaging::{ImageBackend, supported_input_extensions};
use crate::params::ParameterMap;
use crate::thumbnail::{Lookup, Thumbnailer};
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::mpsc::Sender;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Cached(String),
    Built { url: String, retina: bool },
    Unavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEvent {
    pub source: String,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub cached: u32,
    pub built: u32,
    pub retina: u32,
    pub unavailable: u32,
    pub failed: u32,
}

impl BatchSummary {
    fn record(&mut self, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Cached(_) => self.cached += 1,
            BatchOutcome::Built { retina, .. } => {
                self.built += 1;
                if *retina {
                    self.retina += 1;
                }
            }
            BatchOutcome::Unavailable => self.unavailable += 1,
            BatchOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cached + self.built + self.unavailable + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached, {} built ({} @2x), {} unavailable, {} failed ({} total)",
            self.cached,
            self.built,
            self.retina,
            self.unavailable,
            self.failed,
            self.total()
        )
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| supported_input_extensions().contains(&ext.as_str()))
}

/// Public path of `path`: `/`-rooted and relative to `web_root` when it lies
/// below it, otherwise the filesystem path itself.
pub fn public_path(web_root: &Path, path: &Path) -> String {
    match path.strip_prefix(web_root) {
        Ok(relative) => {
            let segments: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("/{}", segments.join("/"))
        }
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Every supported image below `dir`, as sorted public paths. Hidden files
/// and the cache root itself are skipped.
pub fn collect_sources(
    web_root: &Path,
    cache_root: &Path,
    dir: &Path,
) -> Result<Vec<String>, walkdir::Error> {
    let mut sources = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_name().to_string_lossy().starts_with('.')
                || entry.path().starts_with(cache_root))
    });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            sources.push(public_path(web_root, entry.path()));
        }
    }
    sources.sort();
    Ok(sources)
}

/// Thumbnail every source with the same parameters.
pub fn run_batch<B: ImageBackend>(
    thumbnailer: &Thumbnailer<B>,
    sources: &[String],
    params: &ParameterMap,
    hash: Option<&str>,
    events: Option<Sender<BatchEvent>>,
) -> BatchSummary {
    let outcomes: Vec<BatchOutcome> = sources
        .par_iter()
        .map_with(events, |events, source| {
            let outcome = match thumbnailer.thumbnail(source, params, hash) {
                Ok(Lookup::Cached(thumb)) => BatchOutcome::Cached(thumb.url),
                Ok(Lookup::Built(thumb)) => BatchOutcome::Built {
                    retina: thumb.retina.is_some(),
                    url: thumb.url,
                },
                Ok(Lookup::Unavailable) => BatchOutcome::Unavailable,
                Err(err) => BatchOutcome::Failed(err.to_string()),
            };
            if let Some(tx) = events {
                // A dropped receiver only means nobody is listening.
                tx.send(BatchEvent {
                    source: source.clone(),
                    outcome: outcome.clone(),
                })
                .ok();
            }
            outcome
        })
        .collect();

    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        summary.record(outcome);
    }
    summary
}
