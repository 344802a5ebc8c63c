//! Error types for the invx-core library.

use std::path::PathBuf;

use invx_vision::{Backend, VisionError};
use thiserror::Error;

/// Main error type for the invx library.
#[derive(Error, Debug)]
pub enum InvxError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The input document was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The vision backend failed.
    #[error("Processing failed: {0}")]
    Backend(#[from] VisionError),

    /// Anything else caught at the orchestrator boundary.
    #[error("Processing failed: {0}")]
    Unexpected(String),
}

/// Broad classification of an [`InvxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Backend,
    Unexpected,
}

impl InvxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvxError::Config(_) => ErrorKind::Configuration,
            InvxError::Validation(_) => ErrorKind::Validation,
            InvxError::Backend(e) if e.is_configuration() => ErrorKind::Configuration,
            InvxError::Backend(_) => ErrorKind::Backend,
            InvxError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Errors raised while resolving configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// None of the backend credentials is set.
    #[error("No AI provider configured. Please set {}", credential_vars())]
    NoBackendConfigured,

    /// An environment value could not be interpreted.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

fn credential_vars() -> String {
    Backend::ALL
        .iter()
        .map(|b| b.credential_var())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reasons a document fails pre-flight validation.
///
/// The `Display` output is the human-readable reason reported to users.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The path does not name a regular file.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file is larger than the configured limit.
    #[error("File size ({size_mb:.1}MB) exceeds limit ({limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: u64 },

    /// The sniffed content type is not an invoice format.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// The format is recognised but not in the accepted set.
    #[error("Format {0} not supported")]
    FormatNotAccepted(String),

    /// The file header could not be read.
    #[error("Error detecting file type: {0}")]
    Detection(String),
}

/// Result type for the invx library.
pub type Result<T> = std::result::Result<T, InvxError>;
