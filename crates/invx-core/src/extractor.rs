//! Extraction orchestrator: validate, extract, parse.

use std::path::Path;
use std::time::Instant;

use invx_vision::{ExtractOptions, VisionBackend, backend, extract_with};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, InvxError, Result};
use crate::invoice::{INVOICE_INSTRUCTION, InvoiceParser, ResponseParser};
use crate::models::config::ExtractorConfig;
use crate::models::invoice::{InvoiceData, ProcessingResult};
use crate::validate::DocumentValidator;

/// Turns one invoice document into a [`ProcessingResult`].
///
/// Each extractor handles one document at a time; use separate instances for
/// concurrent work. The configuration is never modified.
pub struct InvoiceExtractor {
    config: ExtractorConfig,
    backend: Option<Box<dyn VisionBackend>>,
    options: ExtractOptions,
    parser: ResponseParser,
}

impl InvoiceExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            backend: None,
            options: ExtractOptions::default(),
            parser: ResponseParser::new(),
        }
    }

    /// Use `backend` instead of connecting to the configured provider.
    pub fn with_backend(mut self, backend: Box<dyn VisionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Process a document, blocking until the backend has answered.
    ///
    /// Drives [`Self::process_async`] on a private current-thread runtime, so
    /// it must not be called from inside another tokio runtime.
    pub fn process(&self, path: &Path) -> ProcessingResult {
        let start = Instant::now();
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.process_async(path)),
            Err(e) => {
                let err = InvxError::Unexpected(format!("failed to start runtime: {}", e));
                ProcessingResult::failure(err.to_string(), start.elapsed().as_secs_f64())
            }
        }
    }

    /// Process a document.
    ///
    /// Every failure is reported inside the result; the duration is recorded
    /// on both paths.
    pub async fn process_async(&self, path: &Path) -> ProcessingResult {
        let start = Instant::now();
        let outcome = self.extract(path).await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(data) => {
                info!("Processed {} in {:.2}s", path.display(), elapsed);
                ProcessingResult::success(data, elapsed)
            }
            Err(e) => {
                warn!("Processing {} failed: {}", path.display(), e);
                ProcessingResult::failure(e.to_string(), elapsed)
            }
        }
    }

    /// Run the pipeline and return typed errors instead of an envelope.
    pub async fn extract(&self, path: &Path) -> Result<InvoiceData> {
        if !self.config.has_backend() {
            return Err(ConfigError::NoBackendConfigured.into());
        }

        let document = DocumentValidator::new(&self.config).validate(path)?;
        info!("{}: {}", path.display(), document);

        let selection = self.config.preferred_backend()?;
        let connected;
        let backend: &dyn VisionBackend = match &self.backend {
            Some(backend) => backend.as_ref(),
            None => {
                connected = backend::connect(
                    selection.backend,
                    &selection.model,
                    &selection.credential,
                    selection.base_url.as_deref(),
                )?;
                connected.as_ref()
            }
        };
        debug!("Using {} model {}", backend.backend(), backend.model());

        let text =
            extract_with(backend, &document.path, INVOICE_INSTRUCTION, &self.options).await?;
        debug!("Backend returned {} characters", text.len());

        Ok(self.parser.parse(&text))
    }
}
