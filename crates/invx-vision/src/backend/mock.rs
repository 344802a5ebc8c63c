//! Mock backend for tests.
//!
//! Returns canned responses (or a canned failure) without network access and
//! records every request it receives.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Backend, PageRequest, VisionBackend};
use crate::{Result, VisionError};

/// What the mock answers with.
enum Outcome {
    /// Responses handed out in order, repeating the last one.
    Respond(Vec<String>),
    /// A failure built fresh for every call.
    Fail(Box<dyn Fn() -> VisionError + Send + Sync>),
}

/// A request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub page: u32,
    pub mime: String,
    pub instruction: String,
    pub prior_output: Option<String>,
}

/// Backend returning configured output.
pub struct MockBackend {
    backend: Backend,
    model: String,
    outcome: Outcome,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    /// Answer every page with `response`.
    pub fn responding(response: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Respond(vec![response.into()]))
    }

    /// Answer pages with `responses` in order.
    pub fn responding_pages<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_outcome(Outcome::Respond(
            responses.into_iter().map(Into::into).collect(),
        ))
    }

    /// Fail every call with the error built by `error`.
    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> VisionError + Send + Sync + 'static,
    {
        Self::with_outcome(Outcome::Fail(Box::new(error)))
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            backend: Backend::OpenAi,
            model: "mock-model".to_string(),
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report a different backend family and model.
    pub fn as_backend(mut self, backend: Backend, model: &str) -> Self {
        self.backend = backend;
        self.model = model.to_string();
        self
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &PageRequest<'_>) -> Result<String> {
        let index = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| VisionError::BackendInternalError {
                    status: 0,
                    body: "mock state poisoned".to_string(),
                })?;
            calls.push(RecordedCall {
                page: request.page.number,
                mime: request.page.mime.to_string(),
                instruction: request.instruction.to_string(),
                prior_output: request.prior_output.map(str::to_string),
            });
            calls.len() - 1
        };

        match &self.outcome {
            Outcome::Respond(responses) => Ok(responses
                .get(index)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or_default()),
            Outcome::Fail(error) => Err(error()),
        }
    }
}
