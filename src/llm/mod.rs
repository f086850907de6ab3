pub mod ollama;
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A text-generation backend. One call is one network round trip.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn query(&self, request: &CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn query(&self, request: &CompletionRequest) -> Result<String> {
        (**self).query(request).await
    }
}

/// Everything a backend needs for one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub use ollama::OllamaClient;
pub use scripted::ScriptedClient;
