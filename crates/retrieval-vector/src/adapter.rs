use std::sync::Arc;

use tracing::debug;

use retrieval_core::error::{Error, Result, VectorStage};
use retrieval_core::traits::{EmbeddingProvider, VectorStore};
use retrieval_core::types::ScoredResult;

/// Map a cosine distance in `0..=2` to a similarity in `[0, 1]`.
pub fn distance_to_relevance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).max(0.0)
}

/// Embeds a query and asks the vector store for its nearest chunks.
///
/// Any collaborator failure surfaces as `Error::VectorUnavailable`; an empty
/// result always means the store had nothing to return.
#[derive(Clone)]
pub struct VectorQueryAdapter {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorQueryAdapter {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub async fn query(&self, text: &str, top_k: usize, source_filter: Option<&str>) -> Result<Vec<ScoredResult>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|source| Error::VectorUnavailable { stage: VectorStage::Embedding, source })?;
        let rows = self
            .store
            .nearest_neighbors(&vector, top_k, source_filter)
            .await
            .map_err(|source| Error::VectorUnavailable { stage: VectorStage::Store, source })?;
        debug!(rows = rows.len(), top_k, filtered = source_filter.is_some(), "vector query");
        Ok(rows
            .into_iter()
            .map(|row| {
                let relevance = distance_to_relevance(row.distance);
                ScoredResult::new(row.into_chunk(), relevance)
            })
            .collect())
    }
}
