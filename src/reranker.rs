use rayon::prelude::*;
use tracing::debug;

use crate::{
    chunk::Candidate,
    error::{Error, Result},
    vector::{check_dimension, cosine_similarity, rank_descending},
};

/// Rerank candidates by cosine similarity to the query.
///
/// For each candidate:
/// 1. Check its vector has the query's dimension
/// 2. Compute `dot(q, v) / (|q| * |v| + eps)` against its own vector
///
/// Returns the best `top_n` candidates, sorted by score descending, each
/// carrying its new score. Equal scores keep their input order. Inputs need
/// not be normalized.
///
/// # Examples
///
/// ```
/// use ragrank::{Candidate, Chunk, reranker::rerank};
///
/// let candidates = vec![
///     Candidate::new(Chunk::new("up", "u"), vec![0.0, 1.0]),
///     Candidate::new(Chunk::new("back", "b"), vec![-1.0, 0.0]),
/// ];
/// let best = rerank(&[1.0, 0.0], candidates, 1).unwrap();
/// assert_eq!(best[0].chunk.source_id, "up");
/// ```
pub fn rerank(
    query_vector: &[f32],
    candidates: Vec<Candidate>,
    top_n: usize,
) -> Result<Vec<Candidate>> {
    if top_n == 0 {
        return Err(Error::InvalidConfiguration(
            "top_n must be at least 1".into(),
        ));
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    for candidate in &candidates {
        check_dimension(query_vector.len(), &candidate.vector)?;
    }

    // Score in parallel; collect keeps candidate order.
    let scores: Vec<f32> = candidates
        .par_iter()
        .map(|c| cosine_similarity(query_vector, &c.vector))
        .collect();

    let order = rank_descending(&scores);
    let mut slots: Vec<Option<Candidate>> =
        candidates.into_iter().map(Some).collect();

    let ranked: Vec<Candidate> = order
        .into_iter()
        .take(top_n)
        .filter_map(|i| {
            let mut candidate = slots[i].take()?;
            candidate.score = scores[i];
            Some(candidate)
        })
        .collect();

    debug!(kept = ranked.len(), of = slots.len(), "reranked candidates");
    Ok(ranked)
}
