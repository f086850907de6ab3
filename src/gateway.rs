//! The single door to the text-generation backend.
//!
//! [`GenerationGateway::generate`] performs exactly one
//! [`LlmClient::query`] per call, bounded by a timeout. It never retries,
//! batches or caches; callers decide whether a failed turn is worth repeating.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::llm::{CompletionRequest, LlmClient};
use crate::settings::GameSettings;
use crate::traits::NpcBehavior;
use crate::types::ActionType;

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// What kind of answer a generation call expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Dialogue,
    Action(ActionType),
}

/// A usable model answer
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    /// Set for action responses: the action type the model settled on
    pub action_type: Option<ActionType>,
}

pub struct GenerationGateway {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(client: impl LlmClient + 'static) -> Self {
        Self {
            client: Arc::new(client),
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one generation round trip and shapes the answer.
    ///
    /// `model` overrides the session model for NPCs bound to their own.
    pub async fn generate(
        &self,
        context: String,
        system: String,
        settings: &GameSettings,
        model: Option<&str>,
        shape: ResponseShape,
        behavior: &dyn NpcBehavior,
    ) -> Result<GeneratedText> {
        let request = CompletionRequest {
            model: model.unwrap_or(settings.model.as_str()).to_string(),
            system,
            prompt: context,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        log::debug!(
            "Generation request: model={} shape={:?} prompt_chars={}",
            request.model,
            shape,
            request.prompt.len()
        );

        let raw = match tokio::time::timeout(self.timeout, self.client.query(&request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                log::error!("Generation backend error: {:#}", e);
                return Err(EngineError::generation(format!("{:#}", e)));
            }
            Err(_) => {
                log::error!("Generation timed out after {:?}", self.timeout);
                return Err(EngineError::generation(format!(
                    "request timed out after {:?}",
                    self.timeout
                )));
            }
        };

        behavior.shape_response(shape, &raw).map_err(|detail| {
            log::error!("Unusable generation payload: {}", detail);
            EngineError::generation(detail)
        })
    }
}
