//! Validation of untrusted classification output.
//!
//! The inference service may return anything. [`validate_arguments`] turns its
//! raw JSON into either an accepted [`ClassifiedIntent`] or the persona's
//! fixed default, tagged with why the default was used.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use repoqa_core::config::ClassifierSettings;
use repoqa_core::{ClassifiedIntent, Direction, Intent, Persona};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Transport error, timeout or cancellation.
    Unavailable(String),
    /// The arguments were missing fields or had the wrong shape.
    Malformed(String),
    /// A well-formed intent that this persona may not use.
    IntentNotPermitted(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Unavailable(m) => write!(f, "classifier unavailable: {m}"),
            FallbackReason::Malformed(m) => write!(f, "malformed classification: {m}"),
            FallbackReason::IntentNotPermitted(i) => write!(f, "intent '{i}' not permitted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Classified(ClassifiedIntent),
    Fallback { intent: ClassifiedIntent, reason: FallbackReason },
}

impl Classification {
    pub fn intent(&self) -> &ClassifiedIntent {
        match self {
            Classification::Classified(intent) | Classification::Fallback { intent, .. } => intent,
        }
    }

    pub fn into_intent(self) -> ClassifiedIntent {
        match self {
            Classification::Classified(intent) | Classification::Fallback { intent, .. } => intent,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback { .. })
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "what", "where", "which", "who", "how", "does",
    "did", "are", "was", "were", "have", "has", "had", "can", "could", "would", "should", "our",
    "you", "your", "from", "into", "about", "there", "their", "they", "any", "all", "not", "its",
];

/// Lowercased identifier-ish tokens of `query`, stop words and short tokens
/// removed, first occurrence order, at most `max` of them.
pub fn naive_keywords(query: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3 && !STOP_WORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .take(max)
        .collect()
}

pub fn fallback(persona: Persona, query: &str, settings: &ClassifierSettings, reason: FallbackReason) -> Classification {
    Classification::Fallback {
        intent: ClassifiedIntent {
            intent: persona.default_intent(),
            direction: persona.default_direction(),
            entities: Vec::new(),
            search_keywords: naive_keywords(query, settings.max_keywords),
            repo_scope: None,
        },
        reason,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn validate_arguments(args: &Value, persona: Persona, query: &str, settings: &ClassifierSettings) -> Classification {
    let Some(obj) = args.as_object() else {
        return fallback(persona, query, settings, FallbackReason::Malformed("arguments are not an object".into()));
    };
    let Some(raw_intent) = obj.get("intent").and_then(Value::as_str) else {
        return fallback(persona, query, settings, FallbackReason::Malformed("missing intent".into()));
    };
    let intent = match raw_intent.parse::<Intent>() {
        Ok(intent) if persona.is_valid_for(intent) => intent,
        Ok(_) | Err(_) => {
            return fallback(persona, query, settings, FallbackReason::IntentNotPermitted(raw_intent.to_string()));
        }
    };
    let direction = match obj.get("direction").and_then(Value::as_str).map(str::parse::<Direction>) {
        Some(Ok(direction)) => direction,
        _ => return fallback(persona, query, settings, FallbackReason::Malformed("missing or unknown direction".into())),
    };

    let entities = string_list(obj.get("entities"));

    let mut seen = HashSet::new();
    let mut search_keywords: Vec<String> = string_list(obj.get("search_keywords"))
        .into_iter()
        .filter(|k| seen.insert(k.to_lowercase()))
        .take(settings.max_keywords)
        .collect();
    if search_keywords.len() < settings.min_keywords {
        for extra in naive_keywords(query, settings.max_keywords) {
            if search_keywords.len() >= settings.min_keywords {
                break;
            }
            if seen.insert(extra.clone()) {
                search_keywords.push(extra);
            }
        }
    }

    let repo_scope = obj
        .get("repo_scope")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Classification::Classified(ClassifiedIntent { intent, direction, entities, search_keywords, repo_scope })
}
