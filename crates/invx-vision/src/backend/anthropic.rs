//! Anthropic messages backend.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{Backend, PageRequest, VisionBackend, read_json, trim_base_url};
use crate::{Result, VisionError};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

const API_VERSION: &str = "2023-06-01";

/// Client for Claude models.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, model: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    fn request_body(&self, request: &PageRequest<'_>) -> Result<Value> {
        let page = request.page;
        let block_type = if page.is_pdf() { "document" } else { "image" };

        Ok(json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.instruction,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": block_type,
                        "source": {
                            "type": "base64",
                            "media_type": page.mime,
                            "data": page.encoded()?
                        }
                    },
                    { "type": "text", "text": request.prompt() }
                ]
            }]
        }))
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

fn message_text(response: MessageResponse) -> Result<String> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.trim().is_empty() {
        return Err(VisionError::MalformedResponse(
            "response has no text blocks".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl VisionBackend for AnthropicClient {
    fn backend(&self) -> Backend {
        Backend::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &PageRequest<'_>) -> Result<String> {
        let body = self.request_body(request)?;
        let url = format!("{}/messages", self.base_url);
        debug!("POST {} (page {})", url, request.page.number);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        message_text(read_json(response).await?)
    }
}
