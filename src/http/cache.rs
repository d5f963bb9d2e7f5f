//! HTTP cache validation module
//!
//! `ETag` generation and `If-None-Match` evaluation for served images.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// `Cache-Control` value for stored images; they never change once written
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Strong `ETag` for a file body, e.g. `"1f3a-9c2e07d4b1a8f6e3"`
///
/// The length is part of the tag so truncated copies never match.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// True when the client's `If-None-Match` lists `etag` or `*`
///
/// Weak validators (`W/"..."`) compare equal to their strong form.
pub fn is_not_modified(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    })
}
