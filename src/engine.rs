use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{EngineError, Result};
use crate::gateway::{GeneratedText, GenerationGateway, ResponseShape};
use crate::llm::LlmClient;
use crate::memory::{MemoryEntry, NpcMemory};
use crate::persist::{self, Session, SESSION_VERSION};
use crate::prompts::{ContextAssembler, Cue};
use crate::settings::GameSettings;
use crate::story::{ConversationRecord, StoryState};
use crate::traits::{NpcBehavior, StandardBehavior};
use crate::types::{ActionResponse, ActionType, DialogueExchange, NpcInfo, NpcPersonality, WorldValue};

/// A registered NPC: who they are and how they talk to the model
pub struct NpcAgent {
    /// Identity, temperament and voice
    pub personality: NpcPersonality,
    /// Prompting and response shaping for this NPC
    behavior: Arc<dyn NpcBehavior>,
    /// Model used for this NPC instead of the session default
    model: Option<String>,
}

/// Coordinates turns between the player and the registered NPCs.
///
/// The engine owns the story, every NPC and every NPC memory. All mutation goes
/// through `&mut self`, and a turn only writes state after the generation call
/// has succeeded, so a failed or abandoned turn leaves everything as it was.
pub struct DialogueEngine {
    /// Validated session settings
    settings: GameSettings,
    /// Shared narrative every NPC reacts to
    story: StoryState,
    /// Registered NPCs, keyed by name
    npcs: BTreeMap<String, NpcAgent>,
    /// Conversational memory per NPC, keyed by name
    memories: BTreeMap<String, NpcMemory>,
    /// Door to the generation backend
    gateway: GenerationGateway,
    /// Builds the context sent on each turn
    assembler: ContextAssembler,
}

impl DialogueEngine {
    /// Create an engine with validated settings and a generation backend
    pub fn new(settings: GameSettings, llm_client: impl LlmClient + 'static) -> Result<Self> {
        Self::with_gateway(settings, GenerationGateway::new(llm_client))
    }

    /// Create an engine around a pre-configured gateway
    pub fn with_gateway(settings: GameSettings, gateway: GenerationGateway) -> Result<Self> {
        settings.validate()?;
        log::info!(
            "Dialogue engine ready (model {}, memory {}/{})",
            settings.model,
            settings.memory.capacity,
            settings.memory.context_window
        );
        Ok(Self {
            assembler: ContextAssembler::from_policy(&settings.memory),
            settings,
            story: StoryState::new(),
            npcs: BTreeMap::new(),
            memories: BTreeMap::new(),
            gateway,
        })
    }

    /// Settings the session was started with
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Current story state
    pub fn story(&self) -> &StoryState {
        &self.story
    }

    /// Register an NPC with the standard behaviour
    pub fn add_npc(&mut self, personality: NpcPersonality) -> Result<()> {
        self.add_npc_with_behavior(personality, Arc::new(StandardBehavior))
    }

    /// Register an NPC that generates with its own model
    pub fn add_npc_with_model(&mut self, personality: NpcPersonality, model: impl Into<String>) -> Result<()> {
        let model = checked_model(model.into())?;
        self.register(personality, Arc::new(StandardBehavior), Some(model))
    }

    /// Register an NPC with a custom behaviour
    pub fn add_npc_with_behavior(&mut self, personality: NpcPersonality, behavior: Arc<dyn NpcBehavior>) -> Result<()> {
        self.register(personality, behavior, None)
    }

    fn register(
        &mut self,
        personality: NpcPersonality,
        behavior: Arc<dyn NpcBehavior>,
        model: Option<String>,
    ) -> Result<()> {
        let name = personality.name.clone();
        if self.npcs.contains_key(&name) {
            log::warn!("Rejected duplicate NPC registration: {}", name);
            return Err(EngineError::DuplicateNpc(name));
        }

        // A memory restored from a save is kept; otherwise start empty.
        self.memories
            .entry(name.clone())
            .or_insert_with(|| NpcMemory::new(name.clone()));
        match &model {
            Some(model) => log::info!("Added NPC: {} (model {})", name, model),
            None => log::info!("Added NPC: {}", name),
        }
        self.npcs.insert(
            name,
            NpcAgent {
                personality,
                behavior,
                model,
            },
        );
        Ok(())
    }

    /// Swap the behaviour of a registered NPC, e.g. after loading a session
    pub fn set_behavior(&mut self, npc_name: &str, behavior: Arc<dyn NpcBehavior>) -> Result<()> {
        self.agent_mut(npc_name)?.behavior = behavior;
        Ok(())
    }

    /// Bind an NPC to its own model, or back to the session default with `None`
    pub fn set_model(&mut self, npc_name: &str, model: Option<String>) -> Result<()> {
        let model = model.map(checked_model).transpose()?;
        self.agent_mut(npc_name)?.model = model;
        Ok(())
    }

    /// Model the NPC's next turn will be generated with
    pub fn model_for(&self, npc_name: &str) -> Result<&str> {
        let agent = self.agent(npc_name)?;
        Ok(agent.model.as_deref().unwrap_or(self.settings.model.as_str()))
    }

    /// Unregister an NPC and drop its memory
    pub fn remove_npc(&mut self, npc_name: &str) -> Result<NpcPersonality> {
        let agent = self
            .npcs
            .remove(npc_name)
            .ok_or_else(|| EngineError::UnknownNpc(npc_name.to_string()))?;
        self.memories.remove(npc_name);
        log::info!("Removed NPC: {}", npc_name);
        Ok(agent.personality)
    }

    /// Replace the story wholesale
    pub fn initialize_story(
        &mut self,
        plot_points: Vec<String>,
        active_goals: Vec<String>,
        world_state: BTreeMap<String, WorldValue>,
    ) {
        log::info!(
            "Initialized story with {} plot points and {} goals",
            plot_points.len(),
            active_goals.len()
        );
        self.story = StoryState::with_opening(plot_points, active_goals, world_state);
    }

    /// Route a player utterance to an NPC and record the exchange
    pub async fn process_player_input(&mut self, text: &str, npc_name: &str) -> Result<DialogueExchange> {
        self.process_player_input_with_note(text, npc_name, None).await
    }

    /// Like [`process_player_input`](Self::process_player_input), with a note describing the situation
    pub async fn process_player_input_with_note(
        &mut self,
        text: &str,
        npc_name: &str,
        note: Option<&str>,
    ) -> Result<DialogueExchange> {
        log::debug!("Player to {}: {}", npc_name, text);

        let cue = Cue::PlayerSpeech { utterance: text, note };
        let generated = self.generate_turn(npc_name, cue, ResponseShape::Dialogue).await?;

        let timestamp = Utc::now();
        self.commit_turn(
            npc_name,
            MemoryEntry::with_timestamp(ActionType::Dialogue, text, generated.text.clone(), timestamp),
        );

        let emotional_state = self.agent(npc_name)?.personality.emotional_state.clone();
        log::info!("🎭 {}: {}", npc_name, generated.text);

        Ok(DialogueExchange {
            player_input: text.to_string(),
            npc_name: npc_name.to_string(),
            npc_response: generated.text,
            emotional_state,
            timestamp,
        })
    }

    /// Ask an NPC to act in a situation. `action_type` must name one of the
    /// fixed action types.
    pub async fn trigger_npc_action(&mut self, npc_name: &str, context: &str, action_type: &str) -> Result<ActionResponse> {
        let action_type = action_type.parse::<ActionType>().map_err(|e| {
            log::warn!("Rejected action for {}: {}", npc_name, e);
            e
        })?;
        self.trigger_action(npc_name, context, action_type).await
    }

    /// Typed form of [`trigger_npc_action`](Self::trigger_npc_action)
    pub async fn trigger_action(&mut self, npc_name: &str, context: &str, action_type: ActionType) -> Result<ActionResponse> {
        log::debug!("Triggering {} action for {}", action_type, npc_name);

        let cue = Cue::Action { context, action_type };
        let generated = self
            .generate_turn(npc_name, cue, ResponseShape::Action(action_type))
            .await?;
        let performed = generated.action_type.unwrap_or(action_type);

        let timestamp = Utc::now();
        self.commit_turn(
            npc_name,
            MemoryEntry::with_timestamp(performed, context, generated.text.clone(), timestamp),
        );
        log::info!("🎬 {} ({}): {}", npc_name, performed, generated.text);

        Ok(ActionResponse {
            npc_name: npc_name.to_string(),
            action_type: performed,
            content: generated.text,
            timestamp,
        })
    }

    /// Assemble the context and run the single generation call. Reads only.
    async fn generate_turn(&self, npc_name: &str, cue: Cue<'_>, shape: ResponseShape) -> Result<GeneratedText> {
        let agent = self.agent(npc_name)?;
        let memory = self.memory(npc_name)?;

        let context = self.assembler.assemble(&agent.personality, &self.story, memory, cue);
        let system = agent.behavior.system_prompt(&agent.personality, &self.settings, shape);

        self.gateway
            .generate(
                context,
                system,
                &self.settings,
                agent.model.as_deref(),
                shape,
                agent.behavior.as_ref(),
            )
            .await
    }

    fn commit_turn(&mut self, npc_name: &str, entry: MemoryEntry) {
        self.story.record_conversation(ConversationRecord {
            npc_name: npc_name.to_string(),
            kind: entry.kind,
            player_input: entry.player_input.clone(),
            npc_response: entry.npc_response.clone(),
            timestamp: entry.timestamp,
        });

        let capacity = self.settings.memory.capacity;
        self.memories
            .entry(npc_name.to_string())
            .or_insert_with(|| NpcMemory::new(npc_name))
            .record(entry, capacity);
    }

    /// Names of all registered NPCs, sorted
    pub fn list_npcs(&self) -> Vec<String> {
        self.npcs.keys().cloned().collect()
    }

    /// Read-only view of an NPC with its interaction statistics
    pub fn get_npc_info(&self, npc_name: &str) -> Result<NpcInfo> {
        let personality = &self.agent(npc_name)?.personality;
        let memory = self.memory(npc_name)?;
        let model = self.model_for(npc_name)?;
        Ok(NpcInfo {
            name: personality.name.clone(),
            backstory: personality.backstory.clone(),
            traits: personality.personality_traits.clone(),
            goals: personality.goals.clone(),
            relationships: personality.relationships.clone(),
            emotional_state: personality.emotional_state.clone(),
            model: model.to_string(),
            interaction_count: memory.interaction_count,
            memory_summary: memory.summary(),
        })
    }

    /// Human-readable summary of plot, goals, events and world state
    pub fn get_story_summary(&self) -> String {
        self.story.summary()
    }

    /// Personality of a registered NPC
    pub fn personality(&self, npc_name: &str) -> Result<&NpcPersonality> {
        Ok(&self.agent(npc_name)?.personality)
    }

    /// Memory of a registered NPC
    pub fn memory(&self, npc_name: &str) -> Result<&NpcMemory> {
        if !self.npcs.contains_key(npc_name) {
            return Err(EngineError::UnknownNpc(npc_name.to_string()));
        }
        self.memories
            .get(npc_name)
            .ok_or_else(|| EngineError::UnknownNpc(npc_name.to_string()))
    }

    /// Conversation log, optionally filtered to one NPC
    pub fn conversation_history(&self, npc_name: Option<&str>) -> Vec<&ConversationRecord> {
        self.story
            .conversation_history
            .iter()
            .filter(|record| npc_name.map_or(true, |name| record.npc_name == name))
            .collect()
    }

    /// Append a plot point to the story
    pub fn add_plot_point(&mut self, plot_point: impl Into<String>) {
        self.story.add_plot_point(plot_point);
    }

    /// Start tracking a goal; `false` if it is already active
    pub fn add_active_goal(&mut self, goal: impl Into<String>) -> bool {
        self.story.add_active_goal(goal)
    }

    /// Move an active goal to the completed events
    pub fn complete_goal(&mut self, goal: &str) -> Result<()> {
        self.story.complete_goal(goal).map_err(|e| {
            log::warn!("{}", e);
            e
        })?;
        log::info!("Completed goal: {}", goal);
        Ok(())
    }

    /// Record a completed event; `false` if it was already recorded
    pub fn complete_event(&mut self, event: impl Into<String>) -> bool {
        self.story.complete_event(event)
    }

    /// Set a world-state value, replacing any previous one
    pub fn update_world_state(&mut self, key: impl Into<String>, value: impl Into<WorldValue>) {
        self.story.update_world_state(key, value);
    }

    /// Note something the NPC should never forget
    pub fn add_important_event(&mut self, npc_name: &str, event: impl Into<String>) -> Result<()> {
        self.memory(npc_name)?;
        if let Some(memory) = self.memories.get_mut(npc_name) {
            memory.add_important_event(event);
        }
        Ok(())
    }

    /// Change how an NPC currently feels
    pub fn set_emotional_state(&mut self, npc_name: &str, state: impl Into<String>) -> Result<()> {
        let state = state.into();
        log::debug!("{} now feels {}", npc_name, state);
        self.agent_mut(npc_name)?.personality.emotional_state = state;
        Ok(())
    }

    /// Capture the full session
    pub fn snapshot(&self) -> Session {
        Session {
            version: SESSION_VERSION,
            settings: self.settings.clone(),
            story: self.story.clone(),
            memories: self.memories.clone(),
            personalities: self
                .npcs
                .iter()
                .map(|(name, agent)| (name.clone(), agent.personality.clone()))
                .collect(),
            models: self
                .npcs
                .iter()
                .filter_map(|(name, agent)| agent.model.clone().map(|model| (name.clone(), model)))
                .collect(),
        }
    }

    /// Rebuild an engine from a session. NPCs get the standard behaviour;
    /// use [`set_behavior`](Self::set_behavior) to restore custom ones.
    pub fn restore(session: Session, llm_client: impl LlmClient + 'static) -> Result<Self> {
        Self::restore_with_gateway(session, GenerationGateway::new(llm_client))
    }

    /// Like [`restore`](Self::restore), around a pre-configured gateway
    pub fn restore_with_gateway(session: Session, gateway: GenerationGateway) -> Result<Self> {
        let mut engine = Self::with_gateway(session.settings, gateway)?;
        engine.story = session.story;
        engine.memories = session.memories;
        let mut models = session.models;
        for (name, personality) in session.personalities {
            let model = models.remove(&name).map(checked_model).transpose()?;
            engine.register(personality, Arc::new(StandardBehavior), model)?;
        }
        Ok(engine)
    }

    /// Atomically write the session to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        persist::save_session(path, &self.snapshot())?;
        log::info!("💾 Game saved to {}", path.display());
        Ok(())
    }

    /// Load a session written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>, llm_client: impl LlmClient + 'static) -> Result<Self> {
        let path = path.as_ref();
        let session = persist::load_session(path)?;
        let engine = Self::restore(session, llm_client)?;
        log::info!("📂 Game loaded from {} ({} NPCs)", path.display(), engine.npcs.len());
        Ok(engine)
    }

    fn agent(&self, npc_name: &str) -> Result<&NpcAgent> {
        self.npcs.get(npc_name).ok_or_else(|| {
            log::warn!("Unknown NPC: {}", npc_name);
            EngineError::UnknownNpc(npc_name.to_string())
        })
    }

    fn agent_mut(&mut self, npc_name: &str) -> Result<&mut NpcAgent> {
        self.npcs
            .get_mut(npc_name)
            .ok_or_else(|| EngineError::UnknownNpc(npc_name.to_string()))
    }
}

fn checked_model(model: String) -> Result<String> {
    if model.trim().is_empty() {
        return Err(EngineError::InvalidSettings("model cannot be empty".to_string()));
    }
    Ok(model)
}

/// A [`DialogueEngine`] that can be shared between tasks.
///
/// Every call takes the engine lock for its whole duration, generation
/// included, so concurrent turns are queued rather than interleaved.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<DialogueEngine>>,
}

impl SharedEngine {
    /// Wrap an engine for shared use
    pub fn new(engine: DialogueEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Wait for exclusive access
    pub async fn lock(&self) -> MutexGuard<'_, DialogueEngine> {
        self.inner.lock().await
    }

    /// Exclusive access if no other call is in flight
    pub fn try_lock(&self) -> Option<MutexGuard<'_, DialogueEngine>> {
        self.inner.try_lock().ok()
    }

    /// Queued [`DialogueEngine::process_player_input`]
    pub async fn process_player_input(&self, text: &str, npc_name: &str) -> Result<DialogueExchange> {
        self.inner.lock().await.process_player_input(text, npc_name).await
    }

    /// Queued [`DialogueEngine::trigger_npc_action`]
    pub async fn trigger_npc_action(&self, npc_name: &str, context: &str, action_type: &str) -> Result<ActionResponse> {
        self.inner
            .lock()
            .await
            .trigger_npc_action(npc_name, context, action_type)
            .await
    }

    /// Capture the session once in-flight turns have finished
    pub async fn snapshot(&self) -> Session {
        self.inner.lock().await.snapshot()
    }
}
