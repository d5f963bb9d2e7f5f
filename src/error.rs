//! Upload error taxonomy
//!
//! Every variant is recovered at the request boundary and reported to the
//! client as `400 Bad Request` with a JSON `{ "message": ... }` body.

use std::fmt;
use std::io;
use thiserror::Error;

/// Which ceiling a `SizeLimit` rejection hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// `upload.max_file_size`, applied to the file part
    File,
    /// `http.max_body_size`, applied to the whole request body
    Body,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("File"),
            Self::Body => f.write_str("Request body"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Extension or declared content type is outside the allow-set
    #[error("Error: Images Only!")]
    Validation,

    #[error("{scope} too large: limit is {limit} bytes")]
    SizeLimit { limit: u64, scope: LimitScope },

    #[error("No file uploaded or invalid file type.")]
    MissingFile,

    /// A file arrived in a field other than the upload field, or more than once
    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed upload request: {0}")]
    MalformedRequest(String),

    #[error("Failed to store file: {0}")]
    Storage(#[from] io::Error),
}

impl UploadError {
    /// Short machine-readable tag, used in log lines
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::SizeLimit { .. } => "size_limit",
            Self::MissingFile => "missing_file",
            Self::UnexpectedField(_) => "unexpected_field",
            Self::MalformedRequest(_) => "malformed_request",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<multer::Error> for UploadError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamSizeExceeded { limit } => Self::SizeLimit {
                limit,
                scope: LimitScope::Body,
            },
            other => Self::MalformedRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(UploadError::Validation.to_string(), "Error: Images Only!");
        assert_eq!(
            UploadError::MissingFile.to_string(),
            "No file uploaded or invalid file type."
        );
        assert_eq!(
            UploadError::SizeLimit {
                limit: 2_097_152,
                scope: LimitScope::File
            }
            .to_string(),
            "File too large: limit is 2097152 bytes"
        );
        assert_eq!(
            UploadError::SizeLimit {
                limit: 10_485_760,
                scope: LimitScope::Body
            }
            .to_string(),
            "Request body too large: limit is 10485760 bytes"
        );
        let err = UploadError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_multer_errors() {
        let err = UploadError::from(multer::Error::StreamSizeExceeded { limit: 1024 });
        assert!(matches!(
            err,
            UploadError::SizeLimit {
                limit: 1024,
                scope: LimitScope::Body
            }
        ));

        let err = UploadError::from(multer::Error::IncompleteStream);
        assert_eq!(err.kind(), "malformed_request");
    }
}
