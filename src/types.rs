use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Describes who an NPC is: identity, temperament, ambitions and voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcPersonality {
    pub name: String,
    pub backstory: String,
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    /// Other NPC name -> how this NPC sees them
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    #[serde(default)]
    pub speech_patterns: Option<String>,
    #[serde(default = "default_emotional_state")]
    pub emotional_state: String,
}

fn default_emotional_state() -> String {
    "neutral".to_string()
}

impl NpcPersonality {
    /// Creates a personality with a name and backstory; everything else starts empty
    pub fn new(name: impl Into<String>, backstory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backstory: backstory.into(),
            personality_traits: Vec::new(),
            goals: Vec::new(),
            relationships: BTreeMap::new(),
            speech_patterns: None,
            emotional_state: default_emotional_state(),
        }
    }

    pub fn with_trait(mut self, personality_trait: impl Into<String>) -> Self {
        self.personality_traits.push(personality_trait.into());
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goals.push(goal.into());
        self
    }

    pub fn with_relationship(mut self, npc: impl Into<String>, description: impl Into<String>) -> Self {
        self.relationships.insert(npc.into(), description.into());
        self
    }

    pub fn with_speech_patterns(mut self, speech: impl Into<String>) -> Self {
        self.speech_patterns = Some(speech.into());
        self
    }

    pub fn with_emotional_state(mut self, state: impl Into<String>) -> Self {
        self.emotional_state = state.into();
        self
    }
}

/// The closed set of things an NPC can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Dialogue,
    Movement,
    Emotion,
    Interaction,
    StoryEvent,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Dialogue,
        ActionType::Movement,
        ActionType::Emotion,
        ActionType::Interaction,
        ActionType::StoryEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Dialogue => "dialogue",
            ActionType::Movement => "movement",
            ActionType::Emotion => "emotion",
            ActionType::Interaction => "interaction",
            ActionType::StoryEvent => "story_event",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase().replace('-', "_");
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == tag)
            .ok_or_else(|| EngineError::InvalidActionType(s.to_string()))
    }
}

/// A world-state value. Scalars of different types can live side by side in
/// one map and keep their type through a save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<WorldValue>),
    Map(BTreeMap<String, WorldValue>),
}

impl fmt::Display for WorldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldValue::Bool(b) => write!(f, "{}", b),
            WorldValue::Integer(i) => write!(f, "{}", i),
            WorldValue::Float(x) => write!(f, "{}", x),
            WorldValue::Text(s) => f.write_str(s),
            WorldValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            WorldValue::Map(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

impl From<bool> for WorldValue {
    fn from(value: bool) -> Self {
        WorldValue::Bool(value)
    }
}

impl From<i64> for WorldValue {
    fn from(value: i64) -> Self {
        WorldValue::Integer(value)
    }
}

impl From<i32> for WorldValue {
    fn from(value: i32) -> Self {
        WorldValue::Integer(value.into())
    }
}

impl From<f64> for WorldValue {
    fn from(value: f64) -> Self {
        WorldValue::Float(value)
    }
}

impl From<&str> for WorldValue {
    fn from(value: &str) -> Self {
        WorldValue::Text(value.to_string())
    }
}

impl From<String> for WorldValue {
    fn from(value: String) -> Self {
        WorldValue::Text(value)
    }
}

impl<T: Into<WorldValue>> From<Vec<T>> for WorldValue {
    fn from(values: Vec<T>) -> Self {
        WorldValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// The result of one dialogue turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueExchange {
    pub player_input: String,
    pub npc_name: String,
    pub npc_response: String,
    pub emotional_state: String,
    pub timestamp: DateTime<Utc>,
}

/// The result of a triggered NPC action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub npc_name: String,
    pub action_type: ActionType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of a registered NPC
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcInfo {
    pub name: String,
    pub backstory: String,
    pub traits: Vec<String>,
    pub goals: Vec<String>,
    pub relationships: BTreeMap<String, String>,
    pub emotional_state: String,
    /// Model this NPC's turns are generated with
    pub model: String,
    pub interaction_count: u64,
    pub memory_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personality_defaults() {
        let npc = NpcPersonality::new("Test NPC", "A test character")
            .with_trait("friendly")
            .with_trait("helpful")
            .with_goal("Help the player");

        assert_eq!(npc.name, "Test NPC");
        assert_eq!(npc.personality_traits.len(), 2);
        assert_eq!(npc.emotional_state, "neutral");
        assert!(npc.speech_patterns.is_none());
    }

    #[test]
    fn test_action_type_parsing() {
        assert_eq!("dialogue".parse::<ActionType>().unwrap(), ActionType::Dialogue);
        assert_eq!("MOVEMENT".parse::<ActionType>().unwrap(), ActionType::Movement);
        assert_eq!("story-event".parse::<ActionType>().unwrap(), ActionType::StoryEvent);
        assert!(matches!(
            "dance".parse::<ActionType>(),
            Err(EngineError::InvalidActionType(tag)) if tag == "dance"
        ));
    }

    #[test]
    fn test_action_type_serialization() {
        let json = serde_json::to_string(&ActionType::StoryEvent).unwrap();
        assert_eq!(json, "\"story_event\"");
    }

    #[test]
    fn test_world_value_keeps_scalar_types() {
        let json = r#"{"alarm": true, "guards": 12, "tension": 0.5, "weather": "rain", "ratio": 1.0}"#;
        let values: BTreeMap<String, WorldValue> = serde_json::from_str(json).unwrap();

        assert_eq!(values["alarm"], WorldValue::Bool(true));
        assert_eq!(values["guards"], WorldValue::Integer(12));
        assert_eq!(values["tension"], WorldValue::Float(0.5));
        assert_eq!(values["weather"], WorldValue::Text("rain".to_string()));
        assert_eq!(values["ratio"], WorldValue::Float(1.0));
    }

    #[test]
    fn test_world_value_display() {
        let value = WorldValue::from(vec!["north gate", "harbor"]);
        assert_eq!(value.to_string(), "[north gate, harbor]");
        assert_eq!(WorldValue::from(3i64).to_string(), "3");
    }
}
