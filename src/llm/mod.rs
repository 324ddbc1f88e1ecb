//! Remote completion endpoint
//!
//! The orchestrator sends each command as a single non-streaming
//! generate request. One attempt only; failures are reported to the user,
//! not retried.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Answer used when the endpoint replies without a `response` field
pub const FALLBACK_RESPONSE: &str = "I'm sorry, I encountered an error.";

/// Produces a completion for a prompt
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete `prompt`, returning the response text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Generate request body
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Generate response body; only `response` is used
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for an Ollama-style `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    /// Create a client with the given per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(endpoint: String, model: String, timeout: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(Error::Config("completion endpoint is empty".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "requesting completion");

        let body = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Llm(format!("unparseable completion response: {e}")))?;

        Ok(parsed
            .response
            .map_or_else(|| FALLBACK_RESPONSE.to_string(), |text| text.trim().to_string()))
    }
}
