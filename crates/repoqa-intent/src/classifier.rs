use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use repoqa_core::config::ClassifierSettings;
use repoqa_core::{ClassifiedIntent, InferenceRequest, IntentInference, Persona, RequestScope, Turn};

use crate::prompt::{action_schema, build_messages, system_instruction};
use crate::validate::{fallback, validate_arguments, Classification, FallbackReason};

/// Maps a query to a persona-conformant [`ClassifiedIntent`].
///
/// Holds no per-call state; one instance serves concurrent requests.
/// Failures of the inference service never escape: every path ends in a
/// valid classification, falling back to the persona default.
pub struct IntentClassifier {
    inference: Arc<dyn IntentInference>,
    settings: ClassifierSettings,
}

impl IntentClassifier {
    pub fn new(inference: Arc<dyn IntentInference>, settings: ClassifierSettings) -> Self {
        Self { inference, settings }
    }

    pub async fn classify(&self, query: &str, persona: Persona, history: &[Turn]) -> ClassifiedIntent {
        self.classify_scoped(query, persona, history, &RequestScope::unbounded()).await.into_intent()
    }

    pub async fn classify_scoped(
        &self,
        query: &str,
        persona: Persona,
        history: &[Turn],
        scope: &RequestScope,
    ) -> Classification {
        let request = InferenceRequest {
            system: system_instruction(persona),
            messages: build_messages(history, query, self.settings.history_turns),
            tool: action_schema(persona, &self.settings),
        };
        let scope = scope.narrowed(Duration::from_secs(self.settings.timeout_secs));

        let outcome = match scope.run(self.inference.call_tool(&request)).await {
            Some(Ok(args)) => validate_arguments(&args, persona, query, &self.settings),
            Some(Err(e)) => fallback(persona, query, &self.settings, FallbackReason::Unavailable(e.to_string())),
            None => fallback(persona, query, &self.settings, FallbackReason::Unavailable("deadline exceeded or cancelled".into())),
        };

        match &outcome {
            Classification::Classified(c) => {
                info!(%persona, intent = %c.intent, direction = c.direction.as_str(), repo_scope = ?c.repo_scope, "query classified");
                debug!(keywords = ?c.search_keywords, entities = ?c.entities, "classification detail");
            }
            Classification::Fallback { intent, reason } => {
                warn!(%persona, %reason, intent = %intent.intent, "classification fell back to persona default");
            }
        }
        outcome
    }
}
