use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use repoqa_core::config::RetrievalSettings;
use repoqa_core::{
    ClassifiedIntent, DocumentStore, Embedder, Level, Persona, RequestScope, RetrievalResult, SearchBackend,
    SearchResult,
};

use crate::drilldown::drilldown_path;
use crate::grounding::parent_context;
use crate::ranking::{finalize, is_adequate};

/// Adaptive hierarchical search: embed once, walk the drilldown path level by
/// level and stop as soon as the accumulated hits are good enough.
///
/// Holds only shared read-only handles, so one instance can serve many
/// concurrent requests.
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn DocumentStore>,
    settings: RetrievalSettings,
}

/// Query text plus the classifier's keywords, space separated.
pub fn expand_query(query: &str, intent: &ClassifiedIntent) -> String {
    let mut expanded = query.trim().to_string();
    for kw in &intent.search_keywords {
        if !expanded.is_empty() {
            expanded.push(' ');
        }
        expanded.push_str(kw);
    }
    expanded
}

impl RetrievalOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn DocumentStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { embedder, backend, store, settings }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        intent: &ClassifiedIntent,
        persona: Persona,
        limit: usize,
    ) -> RetrievalResult {
        self.retrieve_scoped(query, intent, persona, limit, &RequestScope::unbounded()).await
    }

    /// Like [`retrieve`](Self::retrieve), but every outbound call is bounded by
    /// `scope`. When the scope expires mid-loop the result assembled so far is
    /// finalized and returned.
    pub async fn retrieve_scoped(
        &self,
        query: &str,
        intent: &ClassifiedIntent,
        persona: Persona,
        limit: usize,
        scope: &RequestScope,
    ) -> RetrievalResult {
        let span = info_span!(
            "retrieve",
            persona = %persona,
            intent = %intent.intent,
            direction = %intent.direction.as_str(),
            repo = intent.repo_scope.as_deref().unwrap_or("*"),
            limit
        );
        self.run(query, intent, limit, scope).instrument(span).await
    }

    async fn run(&self, query: &str, intent: &ClassifiedIntent, limit: usize, scope: &RequestScope) -> RetrievalResult {
        if limit == 0 {
            return RetrievalResult::empty();
        }

        let expanded = expand_query(query, intent);
        let query_vec = match scope.run(self.embedder.embed(&expanded)).await {
            Some(Ok(v)) => v,
            Some(Err(e)) => {
                warn!(error = %e, "query embedding failed");
                return RetrievalResult::empty();
            }
            None => {
                warn!("query embedding abandoned: deadline exceeded or cancelled");
                return RetrievalResult::empty();
            }
        };

        let path = drilldown_path(intent.intent, intent.direction);
        let repo_filter = intent.repo_scope.as_deref();
        let k = limit.saturating_mul(self.settings.fanout_factor.max(1));
        let threshold = self.settings.score_threshold;
        let min_good = self.settings.min_good_results;

        let mut accumulated: Vec<SearchResult> = Vec::new();
        let mut levels_searched: Vec<Level> = Vec::new();

        for level in path {
            let hits = match scope.run(self.backend.search(&query_vec, level, repo_filter, k)).await {
                Some(Ok(hits)) => hits,
                Some(Err(e)) => {
                    warn!(level = %level, error = %e, "level search failed, treating as empty");
                    Vec::new()
                }
                None => {
                    warn!(level = %level, "level search abandoned: deadline exceeded or cancelled");
                    break;
                }
            };
            levels_searched.push(level);

            let (resolved, interrupted) = self.resolve_hits(&hits, repo_filter, scope).await;
            debug!(level = %level, hits = hits.len(), resolved = resolved.len(), "level searched");
            accumulated.extend(resolved);
            if interrupted {
                break;
            }

            if is_adequate(&accumulated, threshold, min_good) {
                debug!(level = %level, "adequate, stopping drilldown");
                break;
            }
        }

        let (results, adequate) = finalize(accumulated, limit, threshold, min_good);
        let parent_context = if scope.is_expired() {
            None
        } else {
            parent_context(
                self.store.as_ref(),
                &results,
                self.settings.max_parents,
                self.settings.parent_excerpt_chars,
                scope,
            )
            .await
        };

        info!(
            results = results.len(),
            levels = levels_searched.len(),
            adequate,
            grounded = parent_context.is_some(),
            "retrieval finished"
        );
        RetrievalResult { results, levels_searched, adequate, parent_context }
    }

    /// Fetch the documents behind `hits`. The flag is set when the scope ran
    /// out before every hit was resolved.
    async fn resolve_hits(
        &self,
        hits: &[repoqa_core::ScoredId],
        repo_filter: Option<&str>,
        scope: &RequestScope,
    ) -> (Vec<SearchResult>, bool) {
        let mut resolved = Vec::with_capacity(hits.len());
        for hit in hits {
            if !hit.score.is_finite() {
                warn!(id = %hit.id, score = hit.score, "hit has a non-finite score, dropping");
                continue;
            }
            let doc = match scope.run(self.store.get(&hit.id)).await {
                Some(Ok(Some(doc))) => doc,
                Some(Ok(None)) => {
                    warn!(id = %hit.id, "hit has no stored document, dropping");
                    continue;
                }
                Some(Err(e)) => {
                    warn!(id = %hit.id, error = %e, "hit fetch failed, dropping");
                    continue;
                }
                None => return (resolved, true),
            };
            if let Some(repo) = repo_filter {
                if doc.repo_id != repo {
                    warn!(id = %hit.id, repo = %doc.repo_id, "hit outside repository scope, dropping");
                    continue;
                }
            }
            resolved.push(SearchResult::from_document(doc, hit.score));
        }
        (resolved, false)
    }
}
