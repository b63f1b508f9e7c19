//! Cache key derivation.
//!
//! A fingerprint is the SHA-256 of:
//!
//! ```text
//! source_path 0x00 canonical_json(params) 0x00 version
//! ```
//!
//! The parameter map serializes in insertion order, so reordering operations
//! yields a different key. The NUL separators keep `("ab", "c")` and
//! `("a", "bc")` apart.

use crate::params::ParameterMap;
use sha2::{Digest, Sha256};

/// Compute the 64-character hex fingerprint for a thumbnail request.
pub fn fingerprint(source: &str, params: &ParameterMap, version: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    // Serializing our own map into a Vec cannot fail: every key is a string
    // and every value is a scalar or a flat map.
    let canonical = serde_json::to_vec(params).unwrap_or_default();
    hasher.update(&canonical);
    hasher.update([0u8]);
    if let Some(version) = version {
        hasher.update(version.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
