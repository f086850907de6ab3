use npc_dialogue::llm::{LlmClient, OllamaClient, ScriptedClient};
use npc_dialogue::{DialogueEngine, GameSettings, NpcPersonality, WorldValue};
use std::collections::BTreeMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== NPC Dialogue Example ===\n");

    // Talk to a real model when OLLAMA_MODEL is set, otherwise play back canned lines
    let mut engine = match std::env::var("OLLAMA_MODEL") {
        Ok(model) => {
            let url = std::env::var("OLLAMA_URL")
                .unwrap_or_else(|_| npc_dialogue::llm::ollama::DEFAULT_OLLAMA_URL.to_string());
            println!("Using Ollama model {} at {}\n", model, url);
            build(GameSettings::new(model), OllamaClient::with_base_url(url))?
        }
        Err(_) => {
            println!("OLLAMA_MODEL not set, using scripted replies\n");
            let client = ScriptedClient::new();
            client
                .push_text("\"State your business. The city is on edge tonight.\"")
                .push_text("Stolen? Keep your voice down. Who told you that?")
                .push_text(r#"{"action_type": "movement", "description": "Aldric steps between you and the gate, hand on his sword."}"#);
            build(GameSettings::default(), client)?
        }
    };

    let exchange = engine
        .process_player_input("Good evening, Captain. What's happening here?", "Captain Aldric")
        .await?;
    println!("Player: {}", exchange.player_input);
    println!("{} ({}): {}\n", exchange.npc_name, exchange.emotional_state, exchange.npc_response);

    let exchange = engine
        .process_player_input_with_note(
            "I heard something valuable was stolen.",
            "Captain Aldric",
            Some("The player is whispering."),
        )
        .await?;
    println!("Player: {}", exchange.player_input);
    println!("{}: {}\n", exchange.npc_name, exchange.npc_response);

    let action = engine
        .trigger_npc_action("Captain Aldric", "A hooded figure runs for the north gate", "movement")
        .await?;
    println!("[{}] {}: {}\n", action.action_type, action.npc_name, action.content);

    engine.complete_goal("Learn what was stolen")?;
    engine.update_world_state("north_gate_closed", true);

    let info = engine.get_npc_info("Captain Aldric")?;
    println!("{} has had {} interactions", info.name, info.interaction_count);
    println!("{}\n", info.memory_summary);
    println!("{}", engine.get_story_summary());

    let path = std::env::temp_dir().join("npc_dialogue_tavern.json");
    engine.save(&path)?;
    println!("Session saved to {}", path.display());

    Ok(())
}

fn build(settings: GameSettings, client: impl LlmClient + 'static) -> anyhow::Result<DialogueEngine> {
    let mut engine = DialogueEngine::new(settings.with_story_style("mystery"), client)?;

    engine.add_npc(
        NpcPersonality::new(
            "Captain Aldric",
            "Commander of the city watch for twenty years. Lost his brother to smugglers.",
        )
        .with_trait("suspicious")
        .with_trait("duty-bound")
        .with_goal("Find the stolen artifact")
        .with_relationship("Mira", "An informant he barely trusts")
        .with_speech_patterns("Short, clipped sentences. Never uses first names."),
    )?;

    let mut world = BTreeMap::new();
    world.insert("city_alert".to_string(), WorldValue::from("high"));
    world.insert("guards_on_duty".to_string(), WorldValue::from(12i64));
    engine.initialize_story(
        vec!["The Star of Veloria was stolen from the temple".to_string()],
        vec!["Learn what was stolen".to_string(), "Find the thief".to_string()],
        world,
    );

    Ok(engine)
}
