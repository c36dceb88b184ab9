//! Exact cosine ranking over the stored chunks.
//!
//! Scores are computed in `f64`. Results are ordered by descending score, with
//! ties broken by ascending chunk ID so output is deterministic.

use codeseek_core::SearchResult;

use crate::store::{Chunk, Document};

/// Number of results returned when the caller asks for zero.
pub const DEFAULT_LIMIT: usize = 10;

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when the dimensions differ, either vector is empty, either
/// vector has zero magnitude, or a component is not finite, so scoring never
/// fails and never yields `NaN`.
///
/// # Examples
///
/// ```
/// use codeseek_index::rank::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    let score = dot / denom;
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Score every chunk in `corpus` against `query` and keep the best `limit`.
///
/// A `limit` of zero means [`DEFAULT_LIMIT`]. The result holds at most
/// `min(limit, corpus size)` entries.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeseek_index::rank::rank;
/// use codeseek_index::store::{Chunk, Document};
///
/// let doc = Document {
///     id: 1,
///     path: PathBuf::from("a.go"),
///     full_content: "x".into(),
///     chunk_ids: vec![2],
/// };
/// let chunk = Chunk {
///     id: 2,
///     document_id: 1,
///     start_line: 1,
///     end_line: 1,
///     content: "x".into(),
///     vector: vec![1.0, 0.0],
/// };
/// let results = rank(&[1.0, 0.0], [(&chunk, &doc)], 5);
/// assert_eq!(results.len(), 1);
/// assert!((results[0].score - 1.0).abs() < 1e-9);
/// ```
pub fn rank<'a, I>(query: &[f32], corpus: I, limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = (&'a Chunk, &'a Document)>,
{
    let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

    let mut scored: Vec<(f64, &Chunk, &Document)> = corpus
        .into_iter()
        .map(|(chunk, doc)| (cosine_similarity(query, &chunk.vector), chunk, doc))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, chunk, doc)| SearchResult {
            path: doc.path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content.clone(),
            score,
        })
        .collect()
}
