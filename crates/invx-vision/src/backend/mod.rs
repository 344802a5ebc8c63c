//! Vision model backends.

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::document::Page;
use crate::{Result, VisionError};

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use mock::MockBackend;
pub use openai::OpenAiClient;

/// Text sent alongside every page.
const PAGE_PROMPT: &str = "Extract the invoice data from this document page.";

/// Longest error body kept in a backend error.
const MAX_ERROR_BODY: usize = 500;

/// Family of hosted vision models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// OpenAI chat completions (GPT models).
    OpenAi,
    /// Google Gemini generateContent.
    Gemini,
    /// Anthropic messages (Claude models).
    Anthropic,
}

impl Backend {
    /// Backends in preference order.
    pub const ALL: [Backend; 3] = [Backend::OpenAi, Backend::Gemini, Backend::Anthropic];

    /// Route a model identifier to its backend by family name.
    pub fn from_model_id(model: &str) -> Option<Self> {
        let model = model.to_lowercase();
        if model.contains("gpt") {
            Some(Backend::OpenAi)
        } else if model.contains("gemini") {
            Some(Backend::Gemini)
        } else if model.contains("claude") {
            Some(Backend::Anthropic)
        } else {
            None
        }
    }

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::OpenAi => "openai",
            Backend::Gemini => "gemini",
            Backend::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the credential.
    pub fn credential_var(&self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI_API_KEY",
            Backend::Gemini => "GEMINI_API_KEY",
            Backend::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable holding the model identifier.
    pub fn model_var(&self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI_MODEL",
            Backend::Gemini => "GEMINI_MODEL",
            Backend::Anthropic => "ANTHROPIC_MODEL",
        }
    }

    /// Environment variable overriding the API endpoint.
    pub fn base_url_var(&self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI_BASE_URL",
            Backend::Gemini => "GEMINI_BASE_URL",
            Backend::Anthropic => "ANTHROPIC_BASE_URL",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::OpenAi => "gpt-4o",
            Backend::Gemini => "gemini-2.0-flash-exp",
            Backend::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }

    /// Public API endpoint.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::OpenAi => openai::DEFAULT_BASE_URL,
            Backend::Gemini => gemini::DEFAULT_BASE_URL,
            Backend::Anthropic => anthropic::DEFAULT_BASE_URL,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single page submitted to a backend.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Task instruction, sent as the system prompt.
    pub instruction: &'a str,
    /// The staged page.
    pub page: &'a Page,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Output of the previous page, used as a formatting reference.
    pub prior_output: Option<&'a str>,
}

impl PageRequest<'_> {
    /// User-turn text accompanying the page.
    pub fn prompt(&self) -> String {
        match self.prior_output {
            Some(prior) => format!(
                "{PAGE_PROMPT}\n\nKeep the response format consistent with the output of the previous page:\n\n{prior}"
            ),
            None => PAGE_PROMPT.to_string(),
        }
    }
}

/// Trait for hosted vision models.
///
/// A backend turns one document page plus an instruction into free-form text.
/// Implementations never retry; every failure is reported to the caller.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Backend family.
    fn backend(&self) -> Backend;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Send a page and return the model's text.
    async fn complete(&self, request: &PageRequest<'_>) -> Result<String>;
}

/// Build the HTTP client for a backend.
pub fn connect(
    backend: Backend,
    model: &str,
    credential: &str,
    base_url: Option<&str>,
) -> Result<Box<dyn VisionBackend>> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("invx/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let base_url = base_url.unwrap_or(backend.default_base_url());

    let client: Box<dyn VisionBackend> = match backend {
        Backend::OpenAi => {
            Box::new(OpenAiClient::new(http, model, credential).with_base_url(base_url))
        }
        Backend::Gemini => {
            Box::new(GeminiClient::new(http, model, credential).with_base_url(base_url))
        }
        Backend::Anthropic => {
            Box::new(AnthropicClient::new(http, model, credential).with_base_url(base_url))
        }
    };
    Ok(client)
}

/// Map a non-success HTTP status to an error kind.
pub(crate) fn status_error(status: u16, body: String) -> VisionError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        401 | 403 => VisionError::AuthFailure { status, body },
        429 => VisionError::RateLimited(body),
        _ => VisionError::BackendInternalError { status, body },
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status.as_u16(), body));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| VisionError::MalformedResponse(e.to_string()))
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_model_routing() {
        assert_eq!(Backend::from_model_id("gpt-4o"), Some(Backend::OpenAi));
        assert_eq!(Backend::from_model_id("GPT-4.1-mini"), Some(Backend::OpenAi));
        assert_eq!(Backend::from_model_id("gemini-2.0-flash-exp"), Some(Backend::Gemini));
        assert_eq!(
            Backend::from_model_id("claude-3-5-sonnet-20241022"),
            Some(Backend::Anthropic)
        );
        assert_eq!(Backend::from_model_id("llama3.2-vision"), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Backend::OpenAi.default_model(), "gpt-4o");
        assert_eq!(Backend::Gemini.credential_var(), "GEMINI_API_KEY");
        assert_eq!(Backend::Anthropic.model_var(), "ANTHROPIC_MODEL");
        for backend in Backend::ALL {
            assert_eq!(Backend::from_model_id(backend.default_model()), Some(backend));
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(401, "bad key".into()),
            VisionError::AuthFailure { status: 401, .. }
        ));
        assert!(matches!(
            status_error(403, String::new()),
            VisionError::AuthFailure { status: 403, .. }
        ));
        assert!(matches!(status_error(429, "slow down".into()), VisionError::RateLimited(_)));
        assert!(matches!(
            status_error(500, String::new()),
            VisionError::BackendInternalError { status: 500, .. }
        ));
        assert!(matches!(
            status_error(400, String::new()),
            VisionError::BackendInternalError { status: 400, .. }
        ));
    }

    #[test]
    fn test_error_body_is_truncated() {
        match status_error(500, "x".repeat(2000)) {
            VisionError::BackendInternalError { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_carries_prior_output() {
        let page = Page::new(1, "application/pdf", PathBuf::from("invoice.pdf"));
        let mut request = PageRequest {
            instruction: "extract",
            page: &page,
            temperature: 0.1,
            max_tokens: 1024,
            prior_output: None,
        };
        assert_eq!(request.prompt(), PAGE_PROMPT);

        request.prior_output = Some("{\"invoice_number\": \"A-1\"}");
        let prompt = request.prompt();
        assert!(prompt.starts_with(PAGE_PROMPT));
        assert!(prompt.ends_with("{\"invoice_number\": \"A-1\"}"));
    }
}
