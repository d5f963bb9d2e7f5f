//! HTTP protocol layer module
//!
//! Response builders, MIME detection, cache validators and Range parsing,
//! kept apart from the upload and image handlers that use them.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{resolve_range, RangeOutcome};
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_image_response, build_json_response, build_options_response, build_partial_response,
    build_text_response,
};
