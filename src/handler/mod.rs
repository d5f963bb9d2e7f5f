//! Request handler module
//!
//! Routes requests to the upload endpoint, the read-only image namespace and
//! the health probes.

pub mod images;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
