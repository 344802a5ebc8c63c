//! OpenAI chat completions backend.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{Backend, PageRequest, VisionBackend, read_json, trim_base_url};
use crate::{Result, VisionError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for GPT vision models.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, model: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Point the client at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    fn request_body(&self, request: &PageRequest<'_>) -> Result<Value> {
        let page = request.page;
        let data_url = page.data_url()?;

        // PDFs go up as file parts, raster pages as images.
        let document = if page.is_pdf() {
            json!({
                "type": "file",
                "file": { "filename": page.file_name(), "file_data": data_url }
            })
        } else {
            json!({
                "type": "image_url",
                "image_url": { "url": data_url }
            })
        };

        Ok(json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.instruction },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.prompt() },
                        document
                    ]
                }
            ]
        }))
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

fn completion_text(completion: ChatCompletion) -> Result<String> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| VisionError::MalformedResponse("response has no choices".to_string()))?;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        return Err(VisionError::MalformedResponse(format!("model refused: {}", refusal)));
    }

    message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| VisionError::MalformedResponse("response has no message content".to_string()))
}

#[async_trait]
impl VisionBackend for OpenAiClient {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &PageRequest<'_>) -> Result<String> {
        let body = self.request_body(request)?;
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (page {})", url, request.page.number);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        completion_text(read_json(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiClient {
        OpenAiClient::new(reqwest::Client::new(), "gpt-4o", "sk-test")
            .with_base_url("http://localhost:9999/v1/")
    }

    #[test]
    fn test_base_url_is_trimmed() {
        assert_eq!(client().base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn test_image_request_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png").unwrap();
        let page = Page::new(1, "image/png", path);

        let request = PageRequest {
            instruction: "extract invoices",
            page: &page,
            temperature: 0.1,
            max_tokens: 4096,
            prior_output: None,
        };
        let body = client().request_body(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"], "extract invoices");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,cG5n"
        );
    }

    #[test]
    fn test_pdf_request_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let page = Page::new(3, "application/pdf", path);

        let request = PageRequest {
            instruction: "extract",
            page: &page,
            temperature: 0.1,
            max_tokens: 4096,
            prior_output: None,
        };
        let body = client().request_body(&request).unwrap();
        let part = &body["messages"][1]["content"][1];

        assert_eq!(part["type"], "file");
        assert_eq!(part["file"]["filename"], "page-3.pdf");
        assert_eq!(part["file"]["file_data"], "data:application/pdf;base64,JVBERg==");
    }

    #[test]
    fn test_completion_text() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"invoice_number\":\"1\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion_text(completion).unwrap(), r#"{"invoice_number":"1"}"#);

        let empty: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(completion_text(empty), Err(VisionError::MalformedResponse(_))));

        let refused: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null,"refusal":"I can't help with that"}}]}"#,
        )
        .unwrap();
        assert!(matches!(completion_text(refused), Err(VisionError::MalformedResponse(_))));
    }
}
