//! CLI output formatting.
//!
//! Output is **information-first**: the primary line of every block is the
//! thing the user asked for (a URL, a source), with status and context shown
//! as indented secondary lines.
//!
//! # Output Format
//!
//! ## url
//!
//! ```text
//! /assets/thumbs/3/3f9c…e1.jpg
//!     Status: built
//!     @2x: /assets/thumbs/3/3f9c…e1@2x.jpg
//! ```
//!
//! ## batch
//!
//! ```text
//! /photos/a.jpg
//!     built → /assets/thumbs/a/a07b…44.jpg (+@2x)
//! /photos/missing.jpg
//!     unavailable
//! ```
//!
//! ## inspect
//!
//! ```text
//! Cache ./assets/thumbs
//!     Entries: 3 (1 @2x)
//!     Fresh: 4
//!     Stale: 0
//!     Size: 2.0 KiB
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchOutcome};
use crate::store::CacheSummary;
use crate::thumbnail::Lookup;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with binary units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ============================================================================
// url
// ============================================================================

pub fn format_lookup(lookup: &Lookup) -> Vec<String> {
    let (thumb, status) = match lookup {
        Lookup::Cached(thumb) => (thumb, "cached"),
        Lookup::Built(thumb) => (thumb, "built"),
        Lookup::Unavailable => return vec!["unavailable".to_string()],
    };
    let mut lines = vec![thumb.url.clone(), format!("{}Status: {status}", indent(1))];
    if let Some(retina) = &thumb.retina_url {
        lines.push(format!("{}@2x: {retina}", indent(1)));
    }
    lines
}

pub fn print_lookup(lookup: &Lookup) {
    for line in format_lookup(lookup) {
        println!("{line}");
    }
}

// ============================================================================
// batch
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    let detail = match &event.outcome {
        BatchOutcome::Cached(url) => format!("cached → {url}"),
        BatchOutcome::Built { url, retina: true } => format!("built → {url} (+@2x)"),
        BatchOutcome::Built { url, retina: false } => format!("built → {url}"),
        BatchOutcome::Unavailable => "unavailable".to_string(),
        BatchOutcome::Failed(reason) => format!("failed: {reason}"),
    };
    vec![event.source.clone(), format!("{}{detail}", indent(1))]
}

// ============================================================================
// inspect
// ============================================================================

pub fn format_inspect(root: &Path, summary: &CacheSummary) -> Vec<String> {
    vec![
        format!("Cache {}", root.display()),
        format!(
            "{}Entries: {} ({} @2x)",
            indent(1),
            summary.entries,
            summary.retina
        ),
        format!("{}Fresh: {}", indent(1), summary.fresh),
        format!("{}Stale: {}", indent(1), summary.stale),
        format!("{}Size: {}", indent(1), format_bytes(summary.bytes)),
    ]
}

pub fn print_inspect(root: &Path, summary: &CacheSummary) {
    for line in format_inspect(root, summary) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail::Thumbnail;
    use std::path::PathBuf;

    fn thumb(retina: bool) -> Thumbnail {
        Thumbnail {
            url: "/assets/thumbs/3/3f.jpg".into(),
            path: PathBuf::from("assets/thumbs/3/3f.jpg"),
            retina_url: retina.then(|| "/assets/thumbs/3/3f@2x.jpg".to_string()),
            retina: retina.then(|| PathBuf::from("assets/thumbs/3/3f@2x.jpg")),
        }
    }

    #[test]
    fn lookup_built_with_retina() {
        assert_eq!(
            format_lookup(&Lookup::Built(thumb(true))),
            vec![
                "/assets/thumbs/3/3f.jpg",
                "    Status: built",
                "    @2x: /assets/thumbs/3/3f@2x.jpg",
            ]
        );
    }

    #[test]
    fn lookup_cached_without_retina() {
        assert_eq!(
            format_lookup(&Lookup::Cached(thumb(false))),
            vec!["/assets/thumbs/3/3f.jpg", "    Status: cached"]
        );
    }

    #[test]
    fn lookup_unavailable() {
        assert_eq!(format_lookup(&Lookup::Unavailable), vec!["unavailable"]);
    }

    #[test]
    fn batch_event_lines() {
        let event = BatchEvent {
            source: "/photos/a.jpg".into(),
            outcome: BatchOutcome::Built {
                url: "/t/a/a1.jpg".into(),
                retina: true,
            },
        };
        assert_eq!(
            format_batch_event(&event),
            vec!["/photos/a.jpg", "    built → /t/a/a1.jpg (+@2x)"]
        );

        let failed = BatchEvent {
            source: "/photos/b.jpg".into(),
            outcome: BatchOutcome::Failed("boom".into()),
        };
        assert_eq!(format_batch_event(&failed)[1], "    failed: boom");
    }

    #[test]
    fn inspect_lines() {
        let summary = CacheSummary {
            entries: 3,
            retina: 1,
            fresh: 4,
            stale: 0,
            bytes: 2048,
        };
        assert_eq!(
            format_inspect(Path::new("./assets/thumbs"), &summary),
            vec![
                "Cache ./assets/thumbs",
                "    Entries: 3 (1 @2x)",
                "    Fresh: 4",
                "    Stale: 0",
                "    Size: 2.0 KiB",
            ]
        );
    }

    #[test]
    fn byte_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
