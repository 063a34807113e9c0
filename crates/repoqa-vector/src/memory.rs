//! In-memory hierarchy for tests and small corpora.
//!
//! [`MemoryStore`] keeps every document in a map and answers searches by
//! brute-force cosine similarity. It implements both [`SearchBackend`] and
//! [`DocumentStore`], so one instance can back the whole orchestrator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use repoqa_core::{DocId, Document, DocumentStore, Level, Result, ScoredId, SearchBackend};

#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<RwLock<HashMap<DocId, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, docs: impl IntoIterator<Item = Document>) {
        let mut store = self.docs.write().await;
        let mut n = 0usize;
        for doc in docs {
            store.insert(doc.id.clone(), doc);
            n += 1;
        }
        debug!(inserted = n, total = store.len(), "memory store insert");
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SearchBackend for MemoryStore {
    async fn search(&self, query_vec: &[f32], level: Level, repo_filter: Option<&str>, k: usize) -> Result<Vec<ScoredId>> {
        let docs = self.docs.read().await;
        let mut scored: Vec<ScoredId> = docs
            .values()
            .filter(|d| d.level == level)
            .filter(|d| repo_filter.map_or(true, |r| d.repo_id == r))
            .map(|d| ScoredId { id: d.id.clone(), score: cosine_similarity(query_vec, &d.vector) })
            .collect();
        // id as tie-breaker keeps the order stable for a fixed k
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(k);
        Ok(scored)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().await.get(id).cloned())
    }
}
