//! Allow-set matching for upload names and declared content types

use crate::config::MatchMode;
use crate::error::UploadError;

/// Checks extensions and content types against the configured allow-set
#[derive(Debug, Clone)]
pub struct TypeFilter {
    tokens: Vec<String>,
    mode: MatchMode,
}

impl TypeFilter {
    /// Tokens are expected lowercased (config normalizes them)
    pub fn new(tokens: &[String], mode: MatchMode) -> Self {
        Self {
            tokens: tokens.to_vec(),
            mode,
        }
    }

    /// Both the extension and the content type must pass
    pub fn check(&self, original_name: &str, content_type: &str) -> Result<(), UploadError> {
        if self.accepts_extension(original_name) && self.accepts_content_type(content_type) {
            Ok(())
        } else {
            Err(UploadError::Validation)
        }
    }

    pub fn accepts_extension(&self, original_name: &str) -> bool {
        let Some(ext) = extension(original_name) else {
            return false;
        };
        match self.mode {
            MatchMode::Strict => self.tokens.iter().any(|t| *t == ext),
            MatchMode::Permissive => {
                let dotted = format!(".{ext}");
                self.tokens.iter().any(|t| dotted.contains(t.as_str()))
            }
        }
    }

    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let lowered = content_type.trim().to_ascii_lowercase();
        match self.mode {
            MatchMode::Strict => {
                let essence = lowered.split(';').next().unwrap_or_default().trim();
                match essence.split_once('/') {
                    Some(("image", subtype)) => self.tokens.iter().any(|t| t == subtype),
                    _ => false,
                }
            }
            MatchMode::Permissive => self.tokens.iter().any(|t| lowered.contains(t.as_str())),
        }
    }
}

/// Lowercased text after the last `.` of the final path component
///
/// Dotfiles such as `.png` have no extension.
pub fn extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}
