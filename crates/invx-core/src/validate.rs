//! Pre-flight checks on input documents.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use invx_vision::sniff_file;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::config::ExtractorConfig;

/// Canonical input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Png,
    Jpg,
}

impl DocumentFormat {
    /// Map a sniffed MIME type to a format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub mime: &'static str,
    /// Size in bytes.
    pub size: u64,
}

impl fmt::Display for ValidatedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Valid {} file", self.format)
    }
}

/// Runs existence, size and content-type checks in that order.
pub struct DocumentValidator<'a> {
    config: &'a ExtractorConfig,
}

impl<'a> DocumentValidator<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self { config }
    }

    /// Validate a document, stopping at the first failed check.
    pub fn validate(&self, path: &Path) -> Result<ValidatedDocument, ValidationError> {
        let size = self.check_exists(path)?;
        self.check_size(size)?;
        let (format, mime) = self.check_content_type(path)?;

        let document = ValidatedDocument {
            path: path.to_path_buf(),
            format,
            mime,
            size,
        };
        debug!("{}: {} ({} bytes)", path.display(), document, size);
        Ok(document)
    }

    /// Validate and report as a flag plus a human-readable reason.
    pub fn check(&self, path: &Path) -> (bool, String) {
        match self.validate(path) {
            Ok(document) => (true, document.to_string()),
            Err(e) => (false, e.to_string()),
        }
    }

    fn check_exists(&self, path: &Path) -> Result<u64, ValidationError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            _ => Err(ValidationError::NotFound(path.to_path_buf())),
        }
    }

    fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.config.max_file_size_bytes() {
            return Err(ValidationError::TooLarge {
                size_mb: size as f64 / (1024.0 * 1024.0),
                limit_mb: self.config.max_file_size_mb(),
            });
        }
        Ok(())
    }

    fn check_content_type(
        &self,
        path: &Path,
    ) -> Result<(DocumentFormat, &'static str), ValidationError> {
        let mime = sniff_file(path).map_err(|e| ValidationError::Detection(e.to_string()))?;

        let format = DocumentFormat::from_mime(mime)
            .ok_or_else(|| ValidationError::UnsupportedType(mime.to_string()))?;

        if !self.config.accepts_format(format.as_str()) {
            return Err(ValidationError::FormatNotAccepted(format.to_string()));
        }
        Ok((format, mime))
    }
}
