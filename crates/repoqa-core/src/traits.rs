use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Document, Level, ScoredId, Turn};

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("embedder returned no vector".to_string()))
    }
}

/// Ranks stored documents of one level against a query vector.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query_vec: &[f32],
        level: Level,
        repo_filter: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredId>>;
}

/// Full-content lookup. `Ok(None)` is the not-found signal.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Document>>;
}

/// A single callable action offered to the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub system: String,
    pub messages: Vec<Turn>,
    pub tool: ToolSchema,
}

/// Structured tool-calling service. The returned arguments are untrusted.
#[async_trait]
pub trait IntentInference: Send + Sync {
    async fn call_tool(&self, request: &InferenceRequest) -> Result<serde_json::Value>;
}
