//! Retrieval-quality metrics over a ranked result list.
//!
//! All metrics identify results by chunk id and return a value in `[0, 1]`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::ScoredResult;

/// Share of the relevant chunks found in the first `k` results.
pub fn recall_at_k(results: &[ScoredResult], relevant: &HashSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let found = results.iter().take(k).filter(|r| relevant.contains(r.id())).count();
    found as f64 / relevant.len() as f64
}

/// Share of the first `k` results that are relevant.
pub fn precision_at_k(results: &[ScoredResult], relevant: &HashSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let found = results.iter().take(k).filter(|r| relevant.contains(r.id())).count();
    found as f64 / k as f64
}

/// `1 / rank` of the first relevant result (1-based), or 0 if none is present.
pub fn reciprocal_rank(results: &[ScoredResult], relevant: &HashSet<String>) -> f64 {
    results
        .iter()
        .position(|r| relevant.contains(r.id()))
        .map_or(0.0, |i| 1.0 / (i + 1) as f64)
}

fn dcg(gains: impl Iterator<Item = f64>) -> f64 {
    gains.enumerate().map(|(i, g)| g / ((i + 2) as f64).log2()).sum()
}

/// Normalized discounted cumulative gain over graded relevance.
pub fn ndcg_at_k(results: &[ScoredResult], grades: &HashMap<String, f64>, k: usize) -> f64 {
    let actual = dcg(results.iter().take(k).map(|r| grades.get(r.id()).copied().unwrap_or(0.0)));
    let mut ideal: Vec<f64> = grades.values().copied().collect();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let ideal = dcg(ideal.into_iter().take(k));
    if ideal == 0.0 { 0.0 } else { actual / ideal }
}

/// A labelled query used to score the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,
    #[serde(default)]
    pub relevant_chunks: Vec<String>,
    #[serde(default)]
    pub relevance_scores: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub recall_at_k: f64,
    pub precision_at_k: f64,
    pub mrr: f64,
    /// Only computed when the case carries graded relevance.
    pub ndcg_at_k: Option<f64>,
}

impl RetrievalMetrics {
    pub fn evaluate(results: &[ScoredResult], case: &EvalCase, k: usize) -> Self {
        let relevant: HashSet<String> = case.relevant_chunks.iter().cloned().collect();
        let ndcg_at_k = if case.relevance_scores.is_empty() {
            None
        } else {
            Some(ndcg_at_k(results, &case.relevance_scores, k))
        };
        Self {
            recall_at_k: recall_at_k(results, &relevant, k),
            precision_at_k: precision_at_k(results, &relevant, k),
            mrr: reciprocal_rank(results, &relevant),
            ndcg_at_k,
        }
    }

    /// Arithmetic mean of each metric; nDCG averages only the cases that have it.
    pub fn mean(all: &[RetrievalMetrics]) -> Self {
        if all.is_empty() {
            return Self::default();
        }
        let n = all.len() as f64;
        let graded: Vec<f64> = all.iter().filter_map(|m| m.ndcg_at_k).collect();
        Self {
            recall_at_k: all.iter().map(|m| m.recall_at_k).sum::<f64>() / n,
            precision_at_k: all.iter().map(|m| m.precision_at_k).sum::<f64>() / n,
            mrr: all.iter().map(|m| m.mrr).sum::<f64>() / n,
            ndcg_at_k: if graded.is_empty() { None } else { Some(graded.iter().sum::<f64>() / graded.len() as f64) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn ranked(ids: &[&str]) -> Vec<ScoredResult> {
        ids.iter().map(|id| ScoredResult::new(Chunk::new(*id, "s", "t"), 0.5)).collect()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recall_and_precision_count_hits_in_prefix() {
        let results = ranked(&["a", "x", "b", "y"]);
        let relevant = set(&["a", "b", "c"]);
        assert!((recall_at_k(&results, &relevant, 2) - 1.0 / 3.0).abs() < 1e-9);
        assert!((recall_at_k(&results, &relevant, 4) - 2.0 / 3.0).abs() < 1e-9);
        assert!((precision_at_k(&results, &relevant, 4) - 0.5).abs() < 1e-9);
        assert_eq!(precision_at_k(&results, &relevant, 0), 0.0);
        assert_eq!(recall_at_k(&results, &HashSet::new(), 4), 0.0);
    }

    #[test]
    fn reciprocal_rank_uses_first_hit() {
        let results = ranked(&["x", "y", "b"]);
        assert!((reciprocal_rank(&results, &set(&["b"])) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(reciprocal_rank(&results, &set(&["z"])), 0.0);
    }

    #[test]
    fn ndcg_is_one_for_ideal_order() {
        let grades: HashMap<String, f64> = [("a".to_string(), 1.0), ("b".to_string(), 0.5)].into_iter().collect();
        assert!((ndcg_at_k(&ranked(&["a", "b"]), &grades, 2) - 1.0).abs() < 1e-9);
        assert!(ndcg_at_k(&ranked(&["b", "a"]), &grades, 2) < 1.0);
        assert_eq!(ndcg_at_k(&ranked(&["a"]), &HashMap::new(), 2), 0.0);
    }

    #[test]
    fn mean_skips_missing_ndcg() {
        let a = RetrievalMetrics { recall_at_k: 1.0, precision_at_k: 0.5, mrr: 1.0, ndcg_at_k: Some(0.8) };
        let b = RetrievalMetrics { recall_at_k: 0.0, precision_at_k: 0.0, mrr: 0.0, ndcg_at_k: None };
        let m = RetrievalMetrics::mean(&[a, b]);
        assert!((m.recall_at_k - 0.5).abs() < 1e-9);
        assert_eq!(m.ndcg_at_k, Some(0.8));
    }
}
