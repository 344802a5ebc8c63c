//! Core library for invoice extraction.
//!
//! This crate provides:
//! - Configuration resolved from the environment, with a fixed backend preference
//! - Pre-flight validation of input documents (existence, size, content type)
//! - Parsing of vision model output into typed invoice records
//! - The extraction orchestrator tying these to an `invx-vision` backend

pub mod error;
pub mod extractor;
pub mod invoice;
pub mod models;
pub mod validate;

pub use error::{ConfigError, ErrorKind, InvxError, Result, ValidationError};
pub use extractor::InvoiceExtractor;
pub use invoice::{INVOICE_INSTRUCTION, InvoiceParser, ResponseParser};
pub use models::config::{BackendSelection, ExtractorConfig};
pub use models::invoice::{Address, Entity, InvoiceData, LineItem, ProcessingResult, Totals};
pub use validate::{DocumentFormat, DocumentValidator, ValidatedDocument};

/// Re-export backend layer types.
pub use invx_vision::{Backend, ExtractOptions, VisionBackend, VisionError};
