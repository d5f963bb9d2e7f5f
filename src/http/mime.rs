//! MIME type detection module
//!
//! Maps a stored file's extension to the `Content-Type` it is served with.

/// Get MIME Content-Type based on a lowercased file extension
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("png") => "image/png",
        Some("jpg" | "jpeg" | "jpe" | "jfif") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("ico") => "image/x-icon",
        // svg included: it can carry script, so it is never served as an image
        _ => "application/octet-stream",
    }
}
