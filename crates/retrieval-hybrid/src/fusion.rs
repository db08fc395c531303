//! Reciprocal Rank Fusion.
//!
//! Each list contributes `1 / (k + rank + 1)` (0-based rank) to every chunk it
//! contains. Only ranks matter, so BM25 scores and cosine similarities can be
//! merged without normalizing either.
use std::collections::HashMap;

use retrieval_core::types::{Chunk, ScoredResult};

pub const DEFAULT_RRF_K: usize = 60;

/// Fuse named ranked lists into one ranking, descending by fused score.
///
/// The chunk kept for an id is the first copy encountered. Equal scores keep
/// encounter order.
pub fn fuse<'a, I>(lists: I, k: usize) -> Vec<ScoredResult>
where
    I: IntoIterator<Item = (&'a str, &'a [ScoredResult])>,
{
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    let mut fused: Vec<(&'a Chunk, f64)> = Vec::new();
    for (_name, results) in lists {
        for (rank, result) in results.iter().enumerate() {
            let contribution = 1.0 / (k as f64 + rank as f64 + 1.0);
            match slots.get(result.id()) {
                Some(&slot) => fused[slot].1 += contribution,
                None => {
                    slots.insert(result.id(), fused.len());
                    fused.push((&result.chunk, contribution));
                }
            }
        }
    }
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
        .into_iter()
        .map(|(chunk, score)| ScoredResult::new(chunk.clone(), score as f32))
        .collect()
}
