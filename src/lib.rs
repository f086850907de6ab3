//! # NPC Dialogue Library
//!
//! A turn-based dialogue engine for interactive fiction: NPCs with a
//! personality, a bounded memory of what was said to them, and a shared story
//! they all react to.
//!
//! ## Features
//!
//! - **Dialogue Engine**: Routes player input and triggered actions to registered NPCs
//! - **Story State**: Plot points, goals, completed events and a typed world-state map
//! - **Memory System**: Per-NPC ring of recent exchanges plus long-lived important events
//! - **Context Assembly**: Deterministic prompt building from personality, story and memory
//! - **Session Saves**: Atomic save/load of the whole playthrough
//! - **LLM Integration**: Built-in Ollama support behind a pluggable client trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use npc_dialogue::{llm::OllamaClient, DialogueEngine, GameSettings, NpcPersonality};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let llm = OllamaClient::new("llama3.2:latest");
//! let mut engine = DialogueEngine::new(GameSettings::default(), llm)?;
//!
//! engine.add_npc(
//!     NpcPersonality::new("Captain Aldric", "Commander of the city watch")
//!         .with_trait("suspicious"),
//! )?;
//!
//! let exchange = engine.process_player_input("Any news?", "Captain Aldric").await?;
//! println!("{}", exchange.npc_response);
//!
//! engine.save("session.json")?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod parser;
pub mod persist;
pub mod prompts;
pub mod settings;
pub mod story;
pub mod traits;
pub mod types;

// Re-export main types for convenience
pub use engine::{DialogueEngine, SharedEngine};
pub use error::{EngineError, Result};
pub use gateway::{GeneratedText, GenerationGateway, ResponseShape};
pub use memory::{MemoryEntry, NpcMemory};
pub use persist::Session;
pub use prompts::{ContextAssembler, Cue};
pub use settings::{GameSettings, MemoryPolicy};
pub use story::{ConversationRecord, StoryState};
pub use traits::{NpcBehavior, StandardBehavior};
pub use types::{ActionResponse, ActionType, DialogueExchange, NpcInfo, NpcPersonality, WorldValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
