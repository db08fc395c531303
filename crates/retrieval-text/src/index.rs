use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use retrieval_core::error::{Error, Result};
use retrieval_core::traits::TextIndexer;
use retrieval_core::types::{Chunk, ScoredResult};

use crate::bm25::Bm25Index;

/// Process-wide owner of the current BM25 snapshot.
///
/// Rebuilds happen off to the side and are published with a single pointer
/// swap, so readers always see either the old or the new index in full.
/// Rebuilding with an empty chunk list publishes an empty index and makes the
/// index not ready again.
#[derive(Default)]
pub struct LexicalIndex {
	current: RwLock<Arc<Bm25Index>>,
}

impl LexicalIndex {
	pub fn new() -> Self { Self::default() }

	/// The published index. Holding the `Arc` keeps it alive across a rebuild.
	pub fn snapshot(&self) -> Arc<Bm25Index> {
		Arc::clone(&self.current.read())
	}

	pub fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
		if let Some(bad) = chunks.iter().find(|c| c.text.trim().is_empty()) {
			return Err(Error::Ingest(format!("chunk '{}' has empty text", bad.id)));
		}
		let built = Arc::new(Bm25Index::build(chunks));
		info!(documents = built.document_count(), avg_doc_len = built.avg_doc_len(), "lexical index rebuilt");
		*self.current.write() = built;
		Ok(())
	}

	pub fn is_ready(&self) -> bool {
		self.current.read().document_count() > 0
	}

	pub fn document_count(&self) -> usize {
		self.current.read().document_count()
	}

	pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>> {
		let snapshot = self.snapshot();
		if snapshot.document_count() == 0 {
			return Err(Error::LexicalNotReady);
		}
		Ok(snapshot.search(query, top_k))
	}
}

impl TextIndexer for LexicalIndex {
	fn index(&self, chunks: &[Chunk]) -> Result<()> { self.index_chunks(chunks.to_vec()) }
	fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredResult>> { Self::search(self, query, k) }
	fn is_ready(&self) -> bool { Self::is_ready(self) }
	fn document_count(&self) -> usize { Self::document_count(self) }
	fn chunks(&self) -> Vec<Chunk> { self.snapshot().chunks().to_vec() }
}
