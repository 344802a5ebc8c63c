//! Document-to-text extraction through a vision backend.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::backend::{self, Backend, PageRequest, VisionBackend};
use crate::document::{StagedDocument, StagingOptions};
use crate::{Result, VisionError};

/// Options controlling a single extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Feed each page's output into the next request as a formatting reference.
    pub maintain_format: bool,
    /// Maximum pages sent to the backend (0 = unlimited).
    pub max_pages: usize,
    /// Longer image side above which images are downscaled (0 = never).
    pub max_image_dimension: u32,
    /// Upper bound on tokens generated per page.
    pub max_tokens: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            maintain_format: false,
            max_pages: 0,
            max_image_dimension: 2048,
            max_tokens: 4096,
        }
    }
}

impl ExtractOptions {
    fn staging(&self) -> StagingOptions {
        StagingOptions {
            max_pages: self.max_pages,
            max_image_dimension: self.max_image_dimension,
        }
    }
}

/// Runs documents through one backend.
pub struct VisionAdapter {
    backend: Box<dyn VisionBackend>,
    options: ExtractOptions,
}

impl VisionAdapter {
    /// Wrap an existing backend.
    pub fn new(backend: Box<dyn VisionBackend>) -> Self {
        Self {
            backend,
            options: ExtractOptions::default(),
        }
    }

    /// Connect to a hosted backend.
    pub fn connect(
        backend: Backend,
        model: &str,
        credential: &str,
        base_url: Option<&str>,
    ) -> Result<Self> {
        Ok(Self::new(backend::connect(backend, model, credential, base_url)?))
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn backend(&self) -> &dyn VisionBackend {
        self.backend.as_ref()
    }

    /// Convert a document into text, one backend call per page.
    pub async fn extract_text(&self, path: &Path, instruction: &str) -> Result<String> {
        extract_with(self.backend.as_ref(), path, instruction, &self.options).await
    }
}

/// Convert a document into text through `backend`, one call per page.
///
/// Page outputs are joined with a blank line in page order. Staged files are
/// removed before returning, whatever the outcome.
pub async fn extract_with(
    backend: &dyn VisionBackend,
    path: &Path,
    instruction: &str,
    options: &ExtractOptions,
) -> Result<String> {
    let start = Instant::now();
    let staged = StagedDocument::stage(path, &options.staging())?;

    info!(
        "Sending {} page(s) of {} to {} model {}",
        staged.pages().len(),
        path.display(),
        backend.backend(),
        backend.model()
    );

    let mut outputs: Vec<String> = Vec::with_capacity(staged.pages().len());
    for page in staged.pages() {
        let prior_output = if options.maintain_format {
            outputs.last().map(String::as_str)
        } else {
            None
        };

        let request = PageRequest {
            instruction,
            page,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            prior_output,
        };
        let text = backend.complete(&request).await?;
        debug!("Page {} returned {} characters", page.number, text.len());
        outputs.push(text);
    }

    staged.cleanup();
    debug!("Extraction took {:?}", start.elapsed());

    Ok(outputs.join("\n\n"))
}

/// Convert a document into text with the backend implied by `model_id`.
///
/// The backend is chosen by family name in the model identifier (`gpt`,
/// `gemini` or `claude`); anything else fails with [`VisionError::UnknownModel`].
pub async fn extract_text(
    path: &Path,
    model_id: &str,
    credential: &str,
    instruction: &str,
    options: &ExtractOptions,
) -> Result<String> {
    let backend = Backend::from_model_id(model_id)
        .ok_or_else(|| VisionError::UnknownModel(model_id.to_string()))?;

    VisionAdapter::connect(backend, model_id, credential, None)?
        .with_options(options.clone())
        .extract_text(path, instruction)
        .await
}
