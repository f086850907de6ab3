use serde::Deserialize;

use crate::gateway::{GeneratedText, ResponseShape};
use crate::parser;
use crate::prompts::templates::{ACTION_SYSTEM_PROMPT, DIALOGUE_SYSTEM_PROMPT};
use crate::settings::GameSettings;
use crate::types::{ActionType, NpcPersonality};

/// How an NPC talks to the generation backend.
///
/// Supplied when the NPC is registered. Implementations pick the system prompt
/// for each kind of turn and turn the raw model text into a usable answer.
pub trait NpcBehavior: Send + Sync {
    /// System prompt sent alongside the assembled context
    fn system_prompt(&self, personality: &NpcPersonality, settings: &GameSettings, shape: ResponseShape) -> String;

    /// Converts raw model output into a response, or explains why it is unusable
    fn shape_response(&self, shape: ResponseShape, raw: &str) -> Result<GeneratedText, String>;
}

/// Behaviour used when an NPC is registered without one
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBehavior;

#[derive(Debug, Deserialize)]
struct ActionReply {
    action_type: String,
    description: String,
}

impl NpcBehavior for StandardBehavior {
    fn system_prompt(&self, _personality: &NpcPersonality, settings: &GameSettings, shape: ResponseShape) -> String {
        let base = match shape {
            ResponseShape::Dialogue => DIALOGUE_SYSTEM_PROMPT,
            ResponseShape::Action(_) => ACTION_SYSTEM_PROMPT,
        };
        let mut prompt = format!(
            "{}\n\nStory style: {}. Difficulty: {}.",
            base, settings.story_style, settings.difficulty
        );
        if let Some(extra) = &settings.custom_instructions {
            prompt.push_str("\n\n");
            prompt.push_str(extra);
        }
        prompt
    }

    fn shape_response(&self, shape: ResponseShape, raw: &str) -> Result<GeneratedText, String> {
        match shape {
            ResponseShape::Dialogue => {
                let text = strip_quotes(raw.trim()).trim();
                if text.is_empty() {
                    return Err("empty dialogue response".to_string());
                }
                Ok(GeneratedText {
                    text: text.to_string(),
                    action_type: None,
                })
            }
            ResponseShape::Action(requested) => shape_action(requested, raw),
        }
    }
}

fn shape_action(requested: ActionType, raw: &str) -> Result<GeneratedText, String> {
    if parser::find_json_object(raw).is_none() {
        let text = raw.trim();
        if text.is_empty() {
            return Err("empty action response".to_string());
        }
        return Ok(GeneratedText {
            text: text.to_string(),
            action_type: Some(requested),
        });
    }

    let reply: ActionReply = parser::extract_json(raw).map_err(|e| format!("malformed action response: {}", e))?;
    let action_type = reply
        .action_type
        .parse::<ActionType>()
        .map_err(|_| format!("model returned unknown action type '{}'", reply.action_type))?;
    let description = reply.description.trim();
    if description.is_empty() {
        return Err("action response has an empty description".to_string());
    }

    Ok(GeneratedText {
        text: description.to_string(),
        action_type: Some(action_type),
    })
}

/// Removes one pair of matching surrounding quotes
fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}
