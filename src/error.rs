//! Error types for the dialogue engine.
//!
//! Every failure the engine can report is a variant of [`EngineError`]. Nothing
//! is retried or swallowed; a failed turn leaves story and memory untouched.

use thiserror::Error;

/// Errors surfaced by the dialogue engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// No NPC is registered under this name
    #[error("Unknown NPC: {0}")]
    UnknownNpc(String),

    /// An NPC with this name is already registered
    #[error("NPC already registered: {0}")]
    DuplicateNpc(String),

    /// Action tag outside the fixed set of action types
    #[error("Invalid action type: {0}")]
    InvalidActionType(String),

    /// Attempt to complete a goal that is not currently active
    #[error("Goal is not active: {goal}")]
    InvalidGoalTransition { goal: String },

    /// The generation backend failed, timed out or returned an unusable payload
    #[error("Generation failed: {detail}")]
    GenerationFailure { detail: String },

    /// A saved session does not have the expected shape
    #[error("Corrupt save: {detail}")]
    CorruptSave { detail: String },

    /// Game settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// IO error while saving or loading a session
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn generation(detail: impl Into<String>) -> Self {
        Self::GenerationFailure {
            detail: detail.into(),
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptSave {
            detail: detail.into(),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::UnknownNpc("Nobody".to_string());
        assert_eq!(err.to_string(), "Unknown NPC: Nobody");

        let err = EngineError::generation("connection refused");
        assert_eq!(err.to_string(), "Generation failed: connection refused");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
