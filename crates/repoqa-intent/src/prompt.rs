//! Prompt and action-schema construction for the classification call.

use serde_json::json;

use repoqa_core::config::ClassifierSettings;
use repoqa_core::{Direction, Persona, ToolSchema, Turn};

pub const TOOL_NAME: &str = "classify_query";

pub fn system_instruction(persona: Persona) -> String {
    let role = match persona {
        Persona::Developer => {
            "You route questions from software developers working inside a set of \
             code repositories. They want to understand, change, or locate code."
        }
        Persona::Sales => {
            "You route questions from a business-development team. They want to \
             know what the organisation has built and can offer, not code details."
        }
    };
    format!(
        "{role}\nCall `{TOOL_NAME}` exactly once. Pick the intent that best matches the \
         latest question, a search direction (broad = whole repositories, narrow = files \
         and their symbols, specific = one named symbol), the entities it names, and 5-10 \
         search keywords including likely identifiers and synonyms. Set repo_scope only \
         when the question clearly targets one repository (owner/name)."
    )
}

/// The last `history_turns` turns followed by the query as a user turn.
pub fn build_messages(history: &[Turn], query: &str, history_turns: usize) -> Vec<Turn> {
    let skip = history.len().saturating_sub(history_turns);
    history[skip..]
        .iter()
        .cloned()
        .chain(std::iter::once(Turn::user(query)))
        .collect()
}

/// Tool schema offering only the intents `persona` may use.
pub fn action_schema(persona: Persona, settings: &ClassifierSettings) -> ToolSchema {
    let intents: Vec<&str> = persona.permitted_intents().iter().map(|i| i.as_str()).collect();
    let intent_help: Vec<String> = persona
        .permitted_intents()
        .iter()
        .map(|i| format!("{}: {}", i.as_str(), i.describe()))
        .collect();
    let directions: Vec<&str> = Direction::ALL.iter().map(|d| d.as_str()).collect();
    ToolSchema {
        name: TOOL_NAME.to_string(),
        description: "Classify the question and expand it into search keywords.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "intent": {
                    "type": "string",
                    "enum": intents,
                    "description": intent_help.join("; "),
                },
                "direction": { "type": "string", "enum": directions },
                "entities": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Names of repositories, modules, files, functions or products mentioned.",
                },
                "search_keywords": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": settings.min_keywords,
                    "maxItems": settings.max_keywords,
                },
                "repo_scope": { "type": "string", "description": "owner/name of a single target repository" },
            },
            "required": ["intent", "direction", "entities", "search_keywords"],
        }),
    }
}
