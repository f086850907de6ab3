//! An [`LlmClient`] that plays back canned replies. Used by tests and demos
//! that must run without a model server.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{CompletionRequest, LlmClient};

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
    /// Waits before answering, for exercising timeouts
    Delay(Duration, String),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    fallback: Option<String>,
    requests: Vec<CompletionRequest>,
}

/// Replays queued replies in order and records every request it receives
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client that answers every request with the same text
    pub fn always(text: impl Into<String>) -> Self {
        let client = Self::new();
        client.lock().fallback = Some(text.into());
        client
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.lock().replies.push_back(ScriptedReply::Text(text.into()));
        self
    }

    pub fn push_failure(&self, detail: impl Into<String>) -> &Self {
        self.lock().replies.push_back(ScriptedReply::Fail(detail.into()));
        self
    }

    pub fn push_delayed(&self, delay: Duration, text: impl Into<String>) -> &Self {
        self.lock()
            .replies
            .push_back(ScriptedReply::Delay(delay, text.into()));
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn query(&self, request: &CompletionRequest) -> Result<String> {
        let next = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            script
                .replies
                .pop_front()
                .or_else(|| script.fallback.clone().map(ScriptedReply::Text))
        };

        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(detail)) => Err(anyhow!(detail)),
            Some(ScriptedReply::Delay(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(anyhow!("scripted client has no reply left")),
        }
    }
}
