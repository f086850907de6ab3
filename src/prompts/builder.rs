use crate::memory::NpcMemory;
use crate::settings::MemoryPolicy;
use crate::story::StoryState;
use crate::types::{ActionType, NpcPersonality};

use super::templates::{ACTION_TASK, DIALOGUE_TASK};

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// What the NPC is reacting to on this turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cue<'a> {
    /// The player addressed the NPC, optionally with a note on the situation
    PlayerSpeech {
        utterance: &'a str,
        note: Option<&'a str>,
    },
    /// The NPC is asked to act in a situation
    Action {
        context: &'a str,
        action_type: ActionType,
    },
}

/// Builds the generation context for one turn.
///
/// Assembly is a pure function of the personality, story, memory and cue:
/// identical inputs always produce identical text. Sections appear in a fixed
/// order: background, goals and relationships, story, memory, speech
/// patterns, then the cue and task.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    context_window: usize,
}

impl ContextAssembler {
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    pub fn from_policy(policy: &MemoryPolicy) -> Self {
        Self::new(policy.context_window)
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    pub fn assemble(
        &self,
        personality: &NpcPersonality,
        story: &StoryState,
        memory: &NpcMemory,
        cue: Cue<'_>,
    ) -> String {
        let mut sections = vec![
            self.format_background(personality),
            self.format_goals_and_relationships(personality),
            self.format_story(story),
            self.format_memory(personality, memory),
        ];

        if let Some(speech) = &personality.speech_patterns {
            sections.push(format!("## Your Speech Patterns\n\n{}", speech));
        }

        sections.push(self.format_cue(personality, cue));

        sections.join(SECTION_SEPARATOR)
    }

    fn format_background(&self, personality: &NpcPersonality) -> String {
        let traits = if personality.personality_traits.is_empty() {
            "None in particular".to_string()
        } else {
            personality.personality_traits.join(", ")
        };

        format!(
            "You are {}, a character in an interactive story.\n\n\
             ## Your Background\n\n{}\n\n\
             ## Your Personality Traits\n\n{}\n\n\
             ## Your Current Emotional State\n\n{}",
            personality.name, personality.backstory, traits, personality.emotional_state
        )
    }

    fn format_goals_and_relationships(&self, personality: &NpcPersonality) -> String {
        let mut out = String::from("## Your Goals\n\n");
        push_list(&mut out, &personality.goals, "None");

        out.push_str("\n## Your Relationships\n\n");
        if personality.relationships.is_empty() {
            out.push_str("- None\n");
        }
        for (name, description) in &personality.relationships {
            out.push_str(&format!("- {}: {}\n", name, description));
        }
        out.trim_end().to_string()
    }

    fn format_story(&self, story: &StoryState) -> String {
        let mut out = String::from("## Story Context\n\n### Plot Points\n\n");
        push_list(&mut out, &story.plot_points, "None yet");

        out.push_str("\n### Active Goals\n\n");
        push_list(&mut out, &story.active_goals, "None");

        out.push_str("\n### Completed Events\n\n");
        push_list(&mut out, &story.completed_events, "None");

        out.push_str("\n### World State\n\n");
        if story.world_state.is_empty() {
            out.push_str("- Nothing notable\n");
        }
        for (key, value) in &story.world_state {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
        out.trim_end().to_string()
    }

    fn format_memory(&self, personality: &NpcPersonality, memory: &NpcMemory) -> String {
        let mut out = String::from("## Your Recent Memories\n\n");
        let mut any = false;
        for entry in memory.recent(self.context_window) {
            out.push_str(&format!("- {}\n", entry.describe(&personality.name)));
            any = true;
        }
        if !any {
            out.push_str("- No specific memories yet.\n");
        }

        out.push_str("\n## Important Events\n\n");
        push_list(&mut out, &memory.important_events, "None");
        out.trim_end().to_string()
    }

    fn format_cue(&self, personality: &NpcPersonality, cue: Cue<'_>) -> String {
        match cue {
            Cue::PlayerSpeech { utterance, note } => {
                let mut out = format!("## The Player Says\n\n\"{}\"\n\n", utterance);
                if let Some(note) = note {
                    out.push_str(&format!("## Situation\n\n{}\n\n", note));
                }
                out.push_str(&DIALOGUE_TASK.replace("{name}", &personality.name));
                out
            }
            Cue::Action {
                context,
                action_type,
            } => {
                let task = ACTION_TASK
                    .replace("{name}", &personality.name)
                    .replace("{action_type}", action_type.as_str());
                format!("## Current Situation\n\n{}\n\n{}", context, task)
            }
        }
    }
}

fn push_list(out: &mut String, items: &[String], empty: &str) {
    if items.is_empty() {
        out.push_str(&format!("- {}\n", empty));
    }
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEntry;
    use crate::types::WorldValue;
    use std::collections::BTreeMap;

    fn aldric() -> NpcPersonality {
        NpcPersonality::new("Captain Aldric", "Commander of the city watch for twenty years.")
            .with_trait("suspicious")
            .with_trait("duty-bound")
            .with_goal("Find the stolen artifact")
            .with_relationship("Mira", "An informant he barely trusts")
            .with_speech_patterns("Clipped, formal sentences.")
    }

    fn story() -> StoryState {
        let mut world = BTreeMap::new();
        world.insert("city_alert".to_string(), "high".into());
        world.insert("guards_on_duty".to_string(), WorldValue::Integer(12));
        StoryState::with_opening(
            vec!["Artifact stolen".to_string()],
            vec!["Recover the artifact".to_string()],
            world,
        )
    }

    fn speech(utterance: &str) -> Cue<'_> {
        Cue::PlayerSpeech {
            utterance,
            note: None,
        }
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let assembler = ContextAssembler::new(5);
        let npc = aldric();
        let story = story();
        let memory = NpcMemory::new("Captain Aldric");

        let first = assembler.assemble(&npc, &story, &memory, speech("Hello!"));
        let second = assembler.assemble(&npc, &story, &memory, speech("Hello!"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_section_order() {
        let assembler = ContextAssembler::new(5);
        let context = assembler.assemble(&aldric(), &story(), &NpcMemory::new("Captain Aldric"), speech("Hello!"));

        let positions: Vec<usize> = [
            "## Your Background",
            "## Your Goals",
            "## Your Relationships",
            "## Story Context",
            "## Your Recent Memories",
            "## Important Events",
            "## Your Speech Patterns",
            "## The Player Says",
            "## Your Task",
        ]
        .iter()
        .map(|heading| context.find(heading).unwrap_or_else(|| panic!("missing {}", heading)))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_story_and_traits_rendered() {
        let assembler = ContextAssembler::new(5);
        let context = assembler.assemble(&aldric(), &story(), &NpcMemory::new("Captain Aldric"), speech("Hi"));

        assert!(context.contains("suspicious, duty-bound"));
        assert!(context.contains("- Artifact stolen"));
        assert!(context.contains("- city_alert: high"));
        assert!(context.contains("- guards_on_duty: 12"));
        assert!(context.contains("- Mira: An informant he barely trusts"));
        assert!(context.contains("- No specific memories yet."));
    }

    #[test]
    fn test_memory_window_limits_exchanges() {
        let assembler = ContextAssembler::new(2);
        let mut memory = NpcMemory::new("Captain Aldric");
        for n in 0..4 {
            memory.record(
                MemoryEntry::new(ActionType::Dialogue, format!("question {}", n), format!("answer {}", n)),
                100,
            );
        }
        memory.add_important_event("The player returned the ledger");

        let context = assembler.assemble(&aldric(), &story(), &memory, speech("Hi"));

        assert!(!context.contains("question 1"));
        assert!(context.contains("question 2"));
        assert!(context.contains("question 3"));
        assert!(context.contains("- The player returned the ledger"));
    }

    #[test]
    fn test_speech_section_omitted_when_absent() {
        let assembler = ContextAssembler::new(5);
        let npc = NpcPersonality::new("Mira", "A street informant");
        let context = assembler.assemble(&npc, &StoryState::new(), &NpcMemory::new("Mira"), speech("Hi"));
        assert!(!context.contains("## Your Speech Patterns"));
    }

    #[test]
    fn test_situational_note_and_action_cue() {
        let assembler = ContextAssembler::new(5);
        let npc = aldric();
        let memory = NpcMemory::new("Captain Aldric");

        let context = assembler.assemble(
            &npc,
            &story(),
            &memory,
            Cue::PlayerSpeech {
                utterance: "Where were you last night?",
                note: Some("The player is holding a bloodied dagger."),
            },
        );
        assert!(context.contains("## Situation\n\nThe player is holding a bloodied dagger."));

        let context = assembler.assemble(
            &npc,
            &story(),
            &memory,
            Cue::Action {
                context: "A thief bolts past the gate.",
                action_type: ActionType::Movement,
            },
        );
        assert!(context.contains("## Current Situation\n\nA thief bolts past the gate."));
        assert!(context.contains("\"action_type\": \"movement\""));
        assert!(context.ends_with("Pick a different one only if the situation clearly calls for it."));
    }
}
