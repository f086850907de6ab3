//! Story state: plot, goals, world variables and the shared conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::error::{EngineError, Result};
use crate::types::{ActionType, WorldValue};

/// Number of conversation records kept in the story log
pub const CONVERSATION_HISTORY_LIMIT: usize = 100;

/// The mutable story ledger shared by every NPC in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    pub plot_points: Vec<String>,
    pub completed_events: Vec<String>,
    pub active_goals: Vec<String>,
    pub world_state: BTreeMap<String, WorldValue>,
    #[serde(default)]
    pub conversation_history: VecDeque<ConversationRecord>,
    pub last_updated: DateTime<Utc>,
}

impl Default for StoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryState {
    pub fn new() -> Self {
        Self {
            plot_points: Vec::new(),
            completed_events: Vec::new(),
            active_goals: Vec::new(),
            world_state: BTreeMap::new(),
            conversation_history: VecDeque::new(),
            last_updated: Utc::now(),
        }
    }

    /// Builds a fresh story from its opening plot, goals and world variables
    pub fn with_opening(
        plot_points: Vec<String>,
        active_goals: Vec<String>,
        world_state: BTreeMap<String, WorldValue>,
    ) -> Self {
        let mut goals: Vec<String> = Vec::with_capacity(active_goals.len());
        for goal in active_goals {
            if !goals.contains(&goal) {
                goals.push(goal);
            }
        }
        Self {
            plot_points,
            active_goals: goals,
            world_state,
            ..Self::new()
        }
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn add_plot_point(&mut self, plot_point: impl Into<String>) {
        let plot_point = plot_point.into();
        log::debug!("Adding plot point: {}", plot_point);
        self.plot_points.push(plot_point);
        self.touch();
    }

    /// Adds a goal unless it is already active. Returns whether it was added.
    pub fn add_active_goal(&mut self, goal: impl Into<String>) -> bool {
        let goal = goal.into();
        if self.active_goals.contains(&goal) {
            return false;
        }
        log::debug!("Adding active goal: {}", goal);
        self.active_goals.push(goal);
        self.touch();
        true
    }

    /// Moves an active goal into the completed events
    pub fn complete_goal(&mut self, goal: &str) -> Result<()> {
        let index = self
            .active_goals
            .iter()
            .position(|g| g == goal)
            .ok_or_else(|| EngineError::InvalidGoalTransition {
                goal: goal.to_string(),
            })?;
        let goal = self.active_goals.remove(index);
        log::debug!("Completing goal: {}", goal);
        self.completed_events.push(goal);
        self.touch();
        Ok(())
    }

    /// Records an event that happened outside the goal list. Duplicates are ignored.
    pub fn complete_event(&mut self, event: impl Into<String>) -> bool {
        let event = event.into();
        if self.completed_events.contains(&event) {
            return false;
        }
        self.completed_events.push(event);
        self.touch();
        true
    }

    pub fn update_world_state(&mut self, key: impl Into<String>, value: impl Into<WorldValue>) {
        let key = key.into();
        let value = value.into();
        log::debug!("World state: {} = {}", key, value);
        self.world_state.insert(key, value);
        self.touch();
    }

    pub fn world_value(&self, key: &str) -> Option<&WorldValue> {
        self.world_state.get(key)
    }

    /// Appends to the conversation log, keeping the most recent records
    pub fn record_conversation(&mut self, record: ConversationRecord) {
        self.conversation_history.push_back(record);
        while self.conversation_history.len() > CONVERSATION_HISTORY_LIMIT {
            self.conversation_history.pop_front();
        }
        self.touch();
    }

    /// Conversation records, optionally for a single NPC, oldest first
    pub fn conversations<'a>(&'a self, npc_name: Option<&'a str>) -> impl Iterator<Item = &'a ConversationRecord> + 'a {
        self.conversation_history
            .iter()
            .filter(move |record| npc_name.map_or(true, |name| record.npc_name == name))
    }

    /// Short digest of the last `last_n` conversations
    pub fn conversation_summary(&self, npc_name: Option<&str>, last_n: usize) -> String {
        let records: Vec<_> = self.conversations(npc_name).collect();
        let recent = &records[records.len().saturating_sub(last_n)..];
        if recent.is_empty() {
            return "No recent conversations.".to_string();
        }

        let mut summary = String::from("Recent conversations:\n");
        for record in recent {
            summary.push_str(&format!("\n- Player: {}\n", truncate(&record.player_input, 50)));
            summary.push_str(&format!("  {}: {}\n", record.npc_name, truncate(&record.npc_response, 50)));
        }
        summary
    }

    /// Full human-readable summary of the story
    pub fn summary(&self) -> String {
        let mut summary = String::from("# Story Summary\n\n");

        summary.push_str(&format!("## Plot Points ({}):\n", self.plot_points.len()));
        push_numbered(&mut summary, &self.plot_points);

        summary.push_str(&format!("\n## Active Goals ({}):\n", self.active_goals.len()));
        push_numbered(&mut summary, &self.active_goals);

        summary.push_str(&format!("\n## Completed Events ({}):\n", self.completed_events.len()));
        push_numbered(&mut summary, &self.completed_events);

        summary.push_str("\n## World State:\n");
        if self.world_state.is_empty() {
            summary.push_str("(none)\n");
        }
        for (key, value) in &self.world_state {
            summary.push_str(&format!("- {}: {}\n", key, value));
        }

        summary
    }
}

fn push_numbered(out: &mut String, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// One turn as seen by the story log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub npc_name: String,
    pub kind: ActionType,
    pub player_input: String,
    pub npc_response: String,
    pub timestamp: DateTime<Utc>,
}
