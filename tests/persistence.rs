use npc_dialogue::llm::ScriptedClient;
use npc_dialogue::{DialogueEngine, EngineError, GameSettings, NpcPersonality, WorldValue};
use std::collections::BTreeMap;
use std::sync::Arc;

async fn played_engine() -> DialogueEngine {
    let client = Arc::new(ScriptedClient::always("Move along."));
    let mut engine = DialogueEngine::new(GameSettings::default().with_story_style("mystery"), client).unwrap();
    engine
        .add_npc(
            NpcPersonality::new("Captain Aldric", "Commander of the city watch")
                .with_trait("suspicious")
                .with_relationship("Mira", "Distrusts her")
                .with_speech_patterns("Clipped."),
        )
        .unwrap();

    let mut world = BTreeMap::new();
    world.insert("city_alert".to_string(), WorldValue::from("high"));
    world.insert("guards_on_duty".to_string(), WorldValue::from(12i64));
    world.insert("tension".to_string(), WorldValue::from(0.5));
    world.insert("gate_closed".to_string(), WorldValue::from(false));
    engine.initialize_story(
        vec!["Artifact stolen".to_string()],
        vec!["Find the thief".to_string()],
        world,
    );

    engine.process_player_input("Hello", "Captain Aldric").await.unwrap();
    engine
        .trigger_npc_action("Captain Aldric", "A scream from the market", "movement")
        .await
        .unwrap();
    engine.add_important_event("Captain Aldric", "The player lied about the docks").unwrap();
    engine.set_emotional_state("Captain Aldric", "wary").unwrap();
    engine
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let engine = played_engine().await;

    engine.save(&path).unwrap();
    let loaded = DialogueEngine::load(&path, ScriptedClient::new()).unwrap();

    assert_eq!(loaded.snapshot(), engine.snapshot());
    assert_eq!(loaded.list_npcs(), vec!["Captain Aldric".to_string()]);
    assert_eq!(loaded.settings().story_style, "mystery");
    assert_eq!(loaded.story().world_value("guards_on_duty"), Some(&WorldValue::Integer(12)));
    assert_eq!(loaded.story().world_value("tension"), Some(&WorldValue::Float(0.5)));
    assert_eq!(loaded.story().world_value("gate_closed"), Some(&WorldValue::Bool(false)));

    let info = loaded.get_npc_info("Captain Aldric").unwrap();
    assert_eq!(info.interaction_count, 2);
    assert_eq!(info.emotional_state, "wary");
}

#[tokio::test]
async fn test_loaded_engine_keeps_playing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    played_engine().await.save(&path).unwrap();

    let client = Arc::new(ScriptedClient::always("You again."));
    let mut loaded = DialogueEngine::load(&path, client.clone()).unwrap();
    loaded.process_player_input("Remember me?", "Captain Aldric").await.unwrap();

    assert_eq!(loaded.memory("Captain Aldric").unwrap().interaction_count, 3);
    let prompt = &client.requests()[0].prompt;
    assert!(prompt.contains("The player lied about the docks"));
    assert!(prompt.contains("A scream from the market"));
}

#[tokio::test]
async fn test_empty_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    let engine = DialogueEngine::new(GameSettings::default(), ScriptedClient::new()).unwrap();

    engine.save(&path).unwrap();
    let loaded = DialogueEngine::load(&path, ScriptedClient::new()).unwrap();

    assert!(loaded.list_npcs().is_empty());
    assert!(loaded.story().plot_points.is_empty());
    assert_eq!(loaded.snapshot(), engine.snapshot());
}

#[tokio::test]
async fn test_failed_save_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut engine = played_engine().await;
    engine.save(&path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    engine.update_world_state("tension", f64::NAN);
    assert!(engine.save(&path).is_err());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_save_over_directory_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("taken");
    std::fs::create_dir(&target).unwrap();
    let engine = played_engine().await;

    let err = engine.save(&target).unwrap_err();

    assert!(matches!(err, EngineError::Io(_)));
    assert!(target.is_dir());
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_corrupt_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    std::fs::write(&path, "{\"version\": 1, \"settings\": ").unwrap();
    let result = DialogueEngine::load(&path, ScriptedClient::new());
    assert!(matches!(result, Err(EngineError::CorruptSave { .. })));

    std::fs::write(&path, "[1, 2, 3]").unwrap();
    let result = DialogueEngine::load(&path, ScriptedClient::new());
    assert!(matches!(result, Err(EngineError::CorruptSave { .. })));
}

#[test]
fn test_non_utf8_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, [0xff, 0xfe, 0x7b]).unwrap();

    let result = DialogueEngine::load(&path, ScriptedClient::new());
    assert!(matches!(result, Err(EngineError::CorruptSave { .. })));
}

#[tokio::test]
async fn test_model_bindings_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut engine = played_engine().await;
    engine.set_model("Captain Aldric", Some("mistral:7b".to_string())).unwrap();
    engine.update_world_state("suspicion", 10.372857142857143);
    engine.save(&path).unwrap();

    let client = Arc::new(ScriptedClient::always("Again?"));
    let mut loaded = DialogueEngine::load(&path, client.clone()).unwrap();
    assert_eq!(loaded.snapshot(), engine.snapshot());
    assert_eq!(
        loaded.story().world_value("suspicion"),
        Some(&WorldValue::Float(10.372857142857143))
    );

    loaded.process_player_input("Hello again", "Captain Aldric").await.unwrap();
    assert_eq!(client.requests()[0].model, "mistral:7b");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = DialogueEngine::load(dir.path().join("missing.json"), ScriptedClient::new());
    assert!(matches!(result, Err(EngineError::Io(_))));
}
