//! Okapi BM25 over an immutable, in-memory chunk set.
//!
//! `idf = ln((N - df + 0.5) / (df + 0.5) + 1)` and each matching document
//! accumulates `idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))`.
use std::collections::HashMap;

use retrieval_core::types::{Chunk, ScoredResult};

use crate::tokenize::prepare;

pub const K1: f64 = 1.2;
pub const B: f64 = 0.75;

/// A built index. Never mutated after `build`; rebuilds produce a new value.
#[derive(Debug, Default)]
pub struct Bm25Index {
	chunks: Vec<Chunk>,
	doc_lengths: Vec<usize>,
	avg_doc_len: f64,
	/// term -> (doc index -> term frequency)
	postings: HashMap<String, HashMap<usize, u32>>,
	/// term -> number of distinct documents containing it
	doc_freq: HashMap<String, usize>,
}

impl Bm25Index {
	pub fn build(chunks: Vec<Chunk>) -> Self {
		let mut doc_lengths = Vec::with_capacity(chunks.len());
		let mut postings: HashMap<String, HashMap<usize, u32>> = HashMap::new();
		let mut doc_freq: HashMap<String, usize> = HashMap::new();

		for (doc, chunk) in chunks.iter().enumerate() {
			let tokens = prepare(&chunk.text);
			doc_lengths.push(tokens.len());
			for token in tokens {
				let freqs = postings.entry(token.clone()).or_default();
				let tf = freqs.entry(doc).or_insert(0);
				if *tf == 0 {
					*doc_freq.entry(token).or_insert(0) += 1;
				}
				*tf += 1;
			}
		}

		let total: usize = doc_lengths.iter().sum();
		let avg_doc_len = if chunks.is_empty() { 0.0 } else { total as f64 / chunks.len() as f64 };
		Self { chunks, doc_lengths, avg_doc_len, postings, doc_freq }
	}

	pub fn document_count(&self) -> usize {
		self.chunks.len()
	}

	pub fn avg_doc_len(&self) -> f64 {
		self.avg_doc_len
	}

	pub fn doc_freq(&self, term: &str) -> usize {
		self.doc_freq.get(term).copied().unwrap_or(0)
	}

	pub fn chunks(&self) -> &[Chunk] {
		&self.chunks
	}

	pub fn idf(&self, df: usize) -> f64 {
		let n = self.chunks.len() as f64;
		let df = df as f64;
		((n - df + 0.5) / (df + 0.5) + 1.0).ln()
	}

	/// Raw BM25 score of every document, in index order.
	pub fn scores(&self, query: &str) -> Vec<f64> {
		let mut scores = vec![0.0f64; self.chunks.len()];
		if self.avg_doc_len == 0.0 {
			return scores;
		}
		for term in prepare(query) {
			let df = self.doc_freq(&term);
			if df == 0 {
				continue;
			}
			let idf = self.idf(df);
			let Some(freqs) = self.postings.get(&term) else { continue };
			for (&doc, &tf) in freqs {
				let tf = f64::from(tf);
				let len_norm = 1.0 - B + B * (self.doc_lengths[doc] as f64 / self.avg_doc_len);
				scores[doc] += idf * (tf * (K1 + 1.0)) / (tf + K1 * len_norm);
			}
		}
		scores
	}

	/// Every document ranked by score (zero scores included), truncated to `top_k`.
	/// Equal scores keep index order.
	pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
		let scores = self.scores(query);
		let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
		ranked
			.into_iter()
			.take(top_k)
			.map(|(doc, score)| ScoredResult::new(self.chunks[doc].clone(), score as f32))
			.collect()
	}
}
