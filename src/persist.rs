//! Session save/load.
//!
//! A session is written as one pretty-printed JSON document. Saving goes
//! through a temporary file in the target directory which is synced and then
//! renamed over the destination, so a reader only ever sees the previous
//! complete file or the new complete file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::memory::NpcMemory;
use crate::settings::GameSettings;
use crate::story::StoryState;
use crate::types::{NpcPersonality, WorldValue};

/// Current save format version
pub const SESSION_VERSION: u32 = 1;

/// Everything needed to resume a playthrough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub version: u32,
    pub settings: GameSettings,
    pub story: StoryState,
    pub memories: BTreeMap<String, NpcMemory>,
    /// Registered NPCs, so a loaded session can resume without re-registration
    #[serde(default)]
    pub personalities: BTreeMap<String, NpcPersonality>,
    /// Per-NPC model bindings; NPCs not listed use the session model
    #[serde(default)]
    pub models: BTreeMap<String, String>,
}

impl Session {
    pub fn new(settings: GameSettings, story: StoryState) -> Self {
        Self {
            version: SESSION_VERSION,
            settings,
            story,
            memories: BTreeMap::new(),
            personalities: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }
}

/// Serializes a session to its on-disk text form
pub fn encode(session: &Session) -> Result<String> {
    for (key, value) in &session.story.world_state {
        if !is_finite(value) {
            return Err(EngineError::corrupt(format!(
                "world state '{}' holds a non-finite number and cannot be saved",
                key
            )));
        }
    }
    serde_json::to_string_pretty(session).map_err(|e| EngineError::corrupt(e.to_string()))
}

/// Parses and validates a session
pub fn decode(text: &str) -> Result<Session> {
    decode_bytes(text.as_bytes())
}

/// Parses and validates a session from raw file content. Bytes that are not
/// UTF-8 JSON are reported as a corrupt save.
pub fn decode_bytes(bytes: &[u8]) -> Result<Session> {
    let session: Session = serde_json::from_slice(bytes).map_err(|e| EngineError::corrupt(e.to_string()))?;

    if session.version != SESSION_VERSION {
        return Err(EngineError::corrupt(format!(
            "unsupported save version {} (expected {})",
            session.version, SESSION_VERSION
        )));
    }

    session
        .settings
        .validate()
        .map_err(|e| EngineError::corrupt(e.to_string()))?;

    for (name, memory) in &session.memories {
        if &memory.npc_name != name {
            return Err(EngineError::corrupt(format!(
                "memory stored under '{}' belongs to '{}'",
                name, memory.npc_name
            )));
        }
        if memory.recent_exchanges.len() > session.settings.memory.capacity {
            return Err(EngineError::corrupt(format!(
                "memory for '{}' holds {} exchanges, more than the capacity of {}",
                name,
                memory.recent_exchanges.len(),
                session.settings.memory.capacity
            )));
        }
    }

    for (name, personality) in &session.personalities {
        if &personality.name != name {
            return Err(EngineError::corrupt(format!(
                "personality stored under '{}' is named '{}'",
                name, personality.name
            )));
        }
    }

    for (name, model) in &session.models {
        if !session.personalities.contains_key(name) {
            return Err(EngineError::corrupt(format!(
                "model binding for '{}', which is not a registered NPC",
                name
            )));
        }
        if model.trim().is_empty() {
            return Err(EngineError::corrupt(format!("empty model binding for '{}'", name)));
        }
    }

    Ok(session)
}

/// Atomically replaces the file at `path` with the encoded session
pub fn save_session(path: impl AsRef<Path>, session: &Session) -> Result<()> {
    let path = path.as_ref();
    let content = encode(session)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".session-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| EngineError::Io(e.error))?;

    log::debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Reads and validates the session at `path`
pub fn load_session(path: impl AsRef<Path>) -> Result<Session> {
    let path = path.as_ref();
    let content = std::fs::read(path)?;
    let session = decode_bytes(&content)?;
    log::debug!(
        "Read session from {} ({} memories)",
        path.display(),
        session.memories.len()
    );
    Ok(session)
}

fn is_finite(value: &WorldValue) -> bool {
    match value {
        WorldValue::Float(x) => x.is_finite(),
        WorldValue::List(items) => items.iter().all(is_finite),
        WorldValue::Map(entries) => entries.values().all(is_finite),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEntry;
    use crate::types::ActionType;

    fn populated() -> Session {
        let mut story = StoryState::new();
        story.add_plot_point("Artifact stolen");
        story.add_active_goal("Recover the artifact");
        story.update_world_state("alarm", true);
        story.update_world_state("guards", 12i64);
        story.update_world_state("tension", 0.75);
        story.update_world_state("weather", "fog");
        story.update_world_state("suspects", vec!["Mira", "Tobin"]);

        let mut memory = NpcMemory::new("Captain Aldric");
        memory.record(MemoryEntry::new(ActionType::Dialogue, "Hello", "Move along."), 100);
        memory.add_important_event("The player lied about the docks");

        let mut session = Session::new(GameSettings::default(), story);
        session.memories.insert("Captain Aldric".to_string(), memory);
        session.personalities.insert(
            "Captain Aldric".to_string(),
            NpcPersonality::new("Captain Aldric", "Watch commander").with_trait("suspicious"),
        );
        session
            .models
            .insert("Captain Aldric".to_string(), "mistral:7b".to_string());
        session
    }

    #[test]
    fn test_round_trip_populated() {
        let session = populated();
        let decoded = decode(&encode(&session).unwrap()).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_round_trip_empty() {
        let session = Session::new(GameSettings::default(), StoryState::new());
        let decoded = decode(&encode(&session).unwrap()).unwrap();
        assert_eq!(decoded, session);
        assert!(decoded.memories.is_empty());
        assert!(decoded.story.plot_points.is_empty());
    }

    #[test]
    fn test_missing_required_section_is_corrupt() {
        let mut value = serde_json::to_value(populated()).unwrap();
        value.as_object_mut().unwrap().remove("story");

        let err = decode(&value.to_string()).unwrap_err();
        assert!(matches!(err, EngineError::CorruptSave { .. }));
    }

    #[test]
    fn test_missing_required_memory_field_is_corrupt() {
        let mut value = serde_json::to_value(populated()).unwrap();
        value["memories"]["Captain Aldric"]
            .as_object_mut()
            .unwrap()
            .remove("interaction_count");

        assert!(matches!(decode(&value.to_string()), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_optional_fields_default() {
        let mut value = serde_json::to_value(populated()).unwrap();
        value["memories"]["Captain Aldric"]
            .as_object_mut()
            .unwrap()
            .remove("important_events");
        value.as_object_mut().unwrap().remove("personalities");
        value.as_object_mut().unwrap().remove("models");

        let session = decode(&value.to_string()).unwrap();
        assert!(session.memories["Captain Aldric"].important_events.is_empty());
        assert!(session.personalities.is_empty());
        assert!(session.models.is_empty());
    }

    #[test]
    fn test_wrong_value_type_is_corrupt() {
        let mut value = serde_json::to_value(populated()).unwrap();
        value["story"]["plot_points"] = serde_json::json!("not a list");
        assert!(matches!(decode(&value.to_string()), Err(EngineError::CorruptSave { .. })));

        let mut value = serde_json::to_value(populated()).unwrap();
        value["settings"]["temperature"] = serde_json::json!(9.5);
        assert!(matches!(decode(&value.to_string()), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_mismatched_memory_key_is_corrupt() {
        let mut session = populated();
        let memory = session.memories.remove("Captain Aldric").unwrap();
        session.memories.insert("Someone Else".to_string(), memory);

        let err = decode(&encode(&session).unwrap()).unwrap_err();
        assert!(err.to_string().contains("Someone Else"));
    }

    #[test]
    fn test_orphan_model_binding_is_corrupt() {
        let mut session = populated();
        session.models.insert("Nobody".to_string(), "mistral:7b".to_string());
        assert!(matches!(decode(&encode(&session).unwrap()), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_computed_floats_survive_round_trip() {
        let mut session = populated();
        for n in 0..2000u64 {
            session
                .story
                .update_world_state(format!("ratio_{}", n), n as f64 / 7.0 * 1.37);
        }
        for (i, bits) in [
            0x3054_4f8b_16a5_0f1du64,
            0x4024_3b6a_7e0c_c2f1,
            0xbfe5_5555_5555_5555,
            0x7fef_ffff_ffff_ffff,
            0x0000_0000_0000_0001,
        ]
        .into_iter()
        .enumerate()
        {
            session
                .story
                .update_world_state(format!("bits_{}", i), f64::from_bits(bits));
        }
        session.story.update_world_state("tiny", 1.0715660391465826e-75);

        let decoded = decode(&encode(&session).unwrap()).unwrap();
        assert_eq!(decoded.story.world_state, session.story.world_state);
        assert_eq!(
            decoded.story.world_value("ratio_1171"),
            Some(&WorldValue::Float(1171.0 / 7.0 * 1.37))
        );
    }

    #[test]
    fn test_non_utf8_bytes_are_corrupt() {
        assert!(matches!(decode_bytes(&[0xff, 0xfe, 0x7b]), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_version_mismatch_is_corrupt() {
        let mut session = populated();
        session.version = 99;
        assert!(matches!(decode(&encode(&session).unwrap()), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(decode("{\"version\": 1, \"sett"), Err(EngineError::CorruptSave { .. })));
        assert!(matches!(decode(""), Err(EngineError::CorruptSave { .. })));
    }

    #[test]
    fn test_non_finite_world_value_is_refused() {
        let mut session = populated();
        session.story.update_world_state("tension", f64::NAN);
        assert!(encode(&session).is_err());
    }
}
