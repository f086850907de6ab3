//! Session configuration.
//!
//! [`GameSettings`] is handed to the engine already built; the engine never
//! reads the environment itself. Settings are validated once when the engine
//! is constructed or a session is loaded, and are read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default number of exchanges an NPC keeps in memory
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// Default number of recent exchanges included in a generation context
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;

/// How much conversational memory each NPC retains and how much of it is
/// shown to the model on each turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    pub capacity: usize,
    pub context_window: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// Immutable configuration snapshot for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub story_style: String,
    pub difficulty: String,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub memory: MemoryPolicy,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2:latest".to_string(),
            temperature: 0.8,
            max_tokens: 500,
            story_style: "adventure".to_string(),
            difficulty: "medium".to_string(),
            custom_instructions: None,
            memory: MemoryPolicy::default(),
        }
    }
}

impl GameSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_story_style(mut self, style: impl Into<String>) -> Self {
        self.story_style = style.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn with_memory_policy(mut self, memory: MemoryPolicy) -> Self {
        self.memory = memory;
        self
    }

    /// Checks the ranges the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EngineError::InvalidSettings("model cannot be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::InvalidSettings(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(EngineError::InvalidSettings(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.memory.capacity == 0 {
            return Err(EngineError::InvalidSettings(
                "memory capacity must be greater than zero".to_string(),
            ));
        }
        if self.memory.context_window > self.memory.capacity {
            return Err(EngineError::InvalidSettings(format!(
                "context window ({}) exceeds memory capacity ({})",
                self.memory.context_window, self.memory.capacity
            )));
        }
        Ok(())
    }
}
