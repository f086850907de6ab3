use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionRequest, LlmClient};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local or remote Ollama server
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: Option<String>,
}

impl OllamaClient {
    /// Creates a client for the default local server.
    ///
    /// `model` overrides the model named in the game settings.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: build_http_client(Duration::from_secs(120)),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: Some(model.into()),
        }
    }

    /// Creates a client that uses whatever model each request names
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_http_client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn query(&self, request: &CompletionRequest) -> Result<String> {
        let model = self.model.as_deref().unwrap_or(&request.model);
        let body = GenerateRequest {
            model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        log::debug!("POST {} (model {})", url, model);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama request failed. Is Ollama running at {}?", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {}", e));
            return Err(anyhow!("Ollama returned status {}: {}", status, error_text));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .context("Ollama returned an unreadable body")?;
        Ok(parsed.response)
    }
}
