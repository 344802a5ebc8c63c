//! Vision model backend layer for invx.
//!
//! This crate turns an invoice document into text using a hosted
//! vision-capable model:
//! - `OpenAiClient` for GPT models (chat completions)
//! - `GeminiClient` for Gemini models (generateContent)
//! - `AnthropicClient` for Claude models (messages)
//!
//! Documents are staged page by page before upload; staged files are removed
//! when extraction finishes.

mod adapter;
pub mod backend;
pub mod document;
mod error;

pub use adapter::{ExtractOptions, VisionAdapter, extract_text, extract_with};
pub use backend::{
    AnthropicClient, Backend, GeminiClient, MockBackend, OpenAiClient, PageRequest, VisionBackend,
};
pub use document::{Page, StagedDocument, StagingOptions, sniff_file, sniff_mime};
pub use error::VisionError;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, VisionError>;
