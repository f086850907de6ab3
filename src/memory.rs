use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::ActionType;

/// Conversational memory for a single NPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcMemory {
    pub npc_name: String,
    pub recent_exchanges: VecDeque<MemoryEntry>,
    #[serde(default)]
    pub important_events: Vec<String>,
    pub interaction_count: u64,
}

impl NpcMemory {
    /// Creates an empty memory for the given NPC
    pub fn new(npc_name: impl Into<String>) -> Self {
        Self {
            npc_name: npc_name.into(),
            recent_exchanges: VecDeque::new(),
            important_events: Vec::new(),
            interaction_count: 0,
        }
    }

    /// Records one turn, evicting the oldest exchanges beyond `capacity`
    pub fn record(&mut self, entry: MemoryEntry, capacity: usize) {
        self.recent_exchanges.push_back(entry);
        while self.recent_exchanges.len() > capacity {
            self.recent_exchanges.pop_front();
        }
        self.interaction_count += 1;
    }

    /// Adds a note that is never evicted
    pub fn add_important_event(&mut self, event: impl Into<String>) {
        self.important_events.push(event.into());
    }

    /// The most recent `count` exchanges, oldest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &MemoryEntry> {
        let skip = self.recent_exchanges.len().saturating_sub(count);
        self.recent_exchanges.iter().skip(skip)
    }

    pub fn latest(&self) -> Option<&MemoryEntry> {
        self.recent_exchanges.back()
    }

    /// One-line description used in NPC info views
    pub fn summary(&self) -> String {
        format!(
            "{} has {} memories, {} important events and {} interactions with the player.",
            self.npc_name,
            self.recent_exchanges.len(),
            self.important_events.len(),
            self.interaction_count
        )
    }
}

/// A single remembered turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub kind: ActionType,
    /// What the player said, or the situation for a triggered action
    pub player_input: String,
    pub npc_response: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(kind: ActionType, player_input: impl Into<String>, npc_response: impl Into<String>) -> Self {
        Self::with_timestamp(kind, player_input, npc_response, Utc::now())
    }

    pub fn with_timestamp(
        kind: ActionType,
        player_input: impl Into<String>,
        npc_response: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            player_input: player_input.into(),
            npc_response: npc_response.into(),
            timestamp,
        }
    }

    /// Renders the entry as a single prompt line
    pub fn describe(&self, npc_name: &str) -> String {
        match self.kind {
            ActionType::Dialogue => format!(
                "Player said: \"{}\" / {} replied: \"{}\"",
                self.player_input, npc_name, self.npc_response
            ),
            kind => format!(
                "({}) In \"{}\", {} did: {}",
                kind, self.player_input, npc_name, self.npc_response
            ),
        }
    }
}
