//! Parent-level context for the answer generator.

use std::collections::HashSet;

use tracing::{debug, warn};

use repoqa_core::{Document, DocumentStore, RequestScope, SearchResult};

/// Distinct parent ids of `results`, in result order, at most `max`.
pub fn parent_ids(results: &[SearchResult], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(|r| r.parent_id.as_deref())
        .filter(|id| seen.insert(*id))
        .take(max)
        .map(str::to_string)
        .collect()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn format_block(doc: &Document, max_chars: usize) -> String {
    let label = doc.path.as_deref().unwrap_or(&doc.repo_id);
    format!("[{}] {}\n{}", doc.level.doc_type(), label, truncate_chars(doc.content.trim(), max_chars))
}

/// Fetch the parents of the top results and join their summaries into one
/// block. `None` when no parent resolves to non-empty content.
pub async fn parent_context(
    store: &dyn DocumentStore,
    results: &[SearchResult],
    max_parents: usize,
    max_chars: usize,
    scope: &RequestScope,
) -> Option<String> {
    let mut blocks = Vec::new();
    for id in parent_ids(results, max_parents) {
        match scope.run(store.get(&id)).await {
            Some(Ok(Some(doc))) if !doc.content.trim().is_empty() => blocks.push(format_block(&doc, max_chars)),
            Some(Ok(Some(_))) => debug!(parent = %id, "parent has no content"),
            Some(Ok(None)) => warn!(parent = %id, "parent document not found"),
            Some(Err(e)) => warn!(parent = %id, error = %e, "parent fetch failed"),
            None => {
                warn!(parent = %id, "parent fetch abandoned: deadline exceeded or cancelled");
                break;
            }
        }
    }
    if blocks.is_empty() { None } else { Some(blocks.join("\n\n")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
