//! Error types for the backend layer.

use thiserror::Error;

/// Errors that can occur while turning a document into text with a vision model.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The backend could not be reached, or the connection dropped.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The backend rejected the credential.
    #[error("authentication failed ({status}): {body}")]
    AuthFailure { status: u16, body: String },

    /// The backend is throttling requests.
    #[error("rate limited by backend: {0}")]
    RateLimited(String),

    /// The backend answered with a non-success status.
    #[error("backend error ({status}): {body}")]
    BackendInternalError { status: u16, body: String },

    /// The backend answered, but the body did not contain usable content.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// The model identifier does not belong to any known backend family.
    #[error("unknown model '{0}': expected a gpt, gemini or claude model")]
    UnknownModel(String),

    /// The document could not be prepared for upload.
    #[error("document preparation failed: {0}")]
    Document(String),

    /// I/O error while reading or staging the document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Whether this failure comes from the configuration rather than the backend.
    pub fn is_configuration(&self) -> bool {
        matches!(self, VisionError::UnknownModel(_))
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VisionError::MalformedResponse(err.to_string())
        } else {
            VisionError::NetworkFailure(err.to_string())
        }
    }
}
