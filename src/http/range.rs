//! HTTP Range request parsing module
//!
//! Single `bytes` ranges only (RFC 7233); multi-range requests are served in full.

/// Inclusive byte span inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self, total: usize) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send back for a request's `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No header, or one we ignore: send the whole file
    Full,
    /// 206 with this span
    Partial(ByteRange),
    /// 416
    Unsatisfiable,
}

/// Resolve a `Range` header against a file of `len` bytes
///
/// Accepts `bytes=a-b`, `bytes=a-` and `bytes=-n`. Malformed headers fall
/// back to [`RangeOutcome::Full`].
pub fn resolve_range(header: Option<&str>, len: usize) -> RangeOutcome {
    let Some(byte_range) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if byte_range.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = byte_range.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        // bytes=-n: the final n bytes
        (true, false) => match last.parse::<usize>() {
            Ok(0) => RangeOutcome::Unsatisfiable,
            Ok(_) if len == 0 => RangeOutcome::Unsatisfiable,
            Ok(n) => RangeOutcome::Partial(ByteRange {
                start: len.saturating_sub(n),
                end: len - 1,
            }),
            Err(_) => RangeOutcome::Full,
        },
        // bytes=a- and bytes=a-b
        (false, _) => {
            let Ok(start) = first.parse::<usize>() else {
                return RangeOutcome::Full;
            };
            let end = if last.is_empty() {
                None
            } else {
                match last.parse::<usize>() {
                    Ok(e) => Some(e),
                    Err(_) => return RangeOutcome::Full,
                }
            };
            if start >= len || end.is_some_and(|e| e < start) {
                return RangeOutcome::Unsatisfiable;
            }
            RangeOutcome::Partial(ByteRange {
                start,
                end: end.map_or(len - 1, |e| e.min(len - 1)),
            })
        }
        (true, true) => RangeOutcome::Full,
    }
}
