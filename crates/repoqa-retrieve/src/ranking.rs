use std::cmp::Ordering;
use std::collections::HashSet;

use repoqa_core::SearchResult;

/// Stopping rule: at least `min_good` results scoring `>= threshold`.
pub fn is_adequate(results: &[SearchResult], threshold: f32, min_good: usize) -> bool {
    results.iter().filter(|r| r.score >= threshold).count() >= min_good
}

/// Descending by score, NaN last.
fn by_score_desc(a: &SearchResult, b: &SearchResult) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (false, false) => b.score.total_cmp(&a.score),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

/// Drop repeated ids (first occurrence wins) and sort by score descending.
pub fn dedup_sorted(accumulated: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SearchResult> = accumulated.into_iter().filter(|r| seen.insert(r.id.clone())).collect();
    // stable sort keeps discovery order among equal scores
    unique.sort_by(by_score_desc);
    unique
}

/// Deduplicate and sort, judge adequacy on the full deduplicated set, then
/// keep the top `limit`.
pub fn finalize(
    accumulated: Vec<SearchResult>,
    limit: usize,
    threshold: f32,
    min_good: usize,
) -> (Vec<SearchResult>, bool) {
    let mut ranked = dedup_sorted(accumulated);
    let adequate = is_adequate(&ranked, threshold, min_good);
    ranked.truncate(limit);
    (ranked, adequate)
}
