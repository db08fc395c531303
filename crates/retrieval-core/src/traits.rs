use std::time::Duration;

use async_trait::async_trait;

use crate::types::{Chunk, NeighborRow, ScoredResult};

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashing:xx64:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Ordered nearest-neighbor queries over stored chunk vectors.
///
/// Rows come back ascending by cosine distance (0 = identical, 2 = opposite).
/// `source_filter` is applied by the store, before the limit.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> anyhow::Result<Vec<NeighborRow>>;
}

/// Write side of a vector store, used by ingestion.
#[async_trait]
pub trait VectorWriter: Send + Sync {
    /// Insert or replace chunks. Every chunk must carry an embedding.
    async fn upsert(&self, chunks: &[Chunk]) -> anyhow::Result<usize>;
    async fn delete_source(&self, source_id: &str) -> anyhow::Result<usize>;
    async fn delete_chunk(&self, chunk_id: &str) -> anyhow::Result<bool>;
}

/// Best-effort shared key/value cache.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
}

/// In-memory lexical index over a fixed chunk set, rebuilt wholesale.
pub trait TextIndexer: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> crate::Result<()>;
    /// Ranked results, descending. Fails with `Error::LexicalNotReady` until built.
    fn search(&self, query: &str, k: usize) -> crate::Result<Vec<ScoredResult>>;
    fn is_ready(&self) -> bool;
    fn document_count(&self) -> usize;
    /// The chunks the current index was built from, in index order.
    fn chunks(&self) -> Vec<Chunk>;
}
