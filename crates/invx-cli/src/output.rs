//! JSON document written for a successful extraction.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use invx_core::{InvoiceData, ProcessingResult};

#[derive(Debug, Serialize)]
pub struct OutputDocument<'a> {
    pub success: bool,
    pub processing_time: Option<f64>,
    pub confidence_score: Option<f64>,
    pub invoice_data: Option<&'a InvoiceData>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub input_file: String,
    pub output_file: String,
    pub model_used: String,
}

impl<'a> OutputDocument<'a> {
    pub fn new(result: &'a ProcessingResult, input: &Path, output: &Path, model: &str) -> Self {
        Self {
            success: result.is_success(),
            processing_time: result.processing_time(),
            confidence_score: result.confidence_score(),
            invoice_data: result.invoice_data(),
            metadata: Metadata {
                input_file: input.display().to_string(),
                output_file: output.display().to_string(),
                model_used: model.to_string(),
            },
        }
    }

    pub fn render(&self, pretty: bool) -> anyhow::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn write(&self, path: &Path, pretty: bool) -> anyhow::Result<()> {
        let json = self.render(pretty)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// `invoice.pdf` becomes `invoice.json` next to it.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}
