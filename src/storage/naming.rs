//! Stored file naming: ingestion timestamps and name sanitizing

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Millisecond clock that never hands out the same value twice
///
/// Values follow wall-clock time but are bumped past the previous value
/// when two uploads land in the same millisecond.
#[derive(Debug, Default)]
pub struct IngestClock {
    last: AtomicU64,
}

impl IngestClock {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|v| v);
        now.max(prev + 1)
    }
}

/// Reduce a client-supplied name to a safe single path component
///
/// Keeps only the final component, replaces anything outside
/// `[A-Za-z0-9._-]` with `_`, collapses runs of dots, strips leading dots
/// and lowercases.
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(original: &str) -> Option<String> {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let mut collapsed = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if !(c == '.' && collapsed.ends_with('.')) {
            collapsed.push(c);
        }
    }
    let cleaned = collapsed.trim_start_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// `{timestamp}-{sanitized name}`, falling back to `upload.{ext}`
pub fn stored_file_name(timestamp: u64, original: &str, extension: Option<&str>) -> String {
    let name = sanitize_file_name(original).unwrap_or_else(|| match extension {
        Some(ext) => format!("upload.{ext}"),
        None => "upload".to_string(),
    });
    format!("{timestamp}-{name}").to_ascii_lowercase()
}

/// True when `name` could have been produced by `stored_file_name`
///
/// Used to refuse lookups that try to leave the storage directory.
pub fn is_safe_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
