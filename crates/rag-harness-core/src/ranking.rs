//! Deterministic top-k ordering for retrieval hits.
//!
//! Sort order: score descending, then document id ascending. `NaN` scores
//! sort last. The sort is stable, so hits that are equal on both keys keep
//! the order the store returned them in.

use std::cmp::Ordering;

use crate::models::ScoredDocument;

/// Total order used for retrieval results.
pub fn compare_hits(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => a.id.cmp(&b.id),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id)),
    }
}

/// Sort `hits` into retrieval order and keep the best `k`.
pub fn rank_top_k(mut hits: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    hits.sort_by(compare_hits);
    hits.truncate(k);
    hits
}
