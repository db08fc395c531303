use async_trait::async_trait;
use parking_lot::RwLock;

use retrieval_core::traits::{VectorStore, VectorWriter};
use retrieval_core::types::{Chunk, NeighborRow};

/// `1 - cos(a, b)`, in `0..=2`. Zero vectors are treated as orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (na * nb)).clamp(0.0, 2.0)
}

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Brute-force cosine store held in process memory.
///
/// Rows keep insertion order; an upsert of an existing id replaces it in place.
#[derive(Default)]
pub struct InMemoryVectorStore {
    rows: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.rows.read().len() }

    pub fn is_empty(&self) -> bool { self.rows.read().is_empty() }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn nearest_neighbors(&self, vector: &[f32], top_k: usize, source_filter: Option<&str>) -> anyhow::Result<Vec<NeighborRow>> {
        let rows = self.rows.read();
        let mut scored: Vec<(f32, &StoredChunk)> = rows
            .iter()
            .filter(|r| source_filter.map_or(true, |s| r.chunk.source_id == s))
            .map(|r| (cosine_distance(vector, &r.vector), r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, r)| NeighborRow {
                chunk_id: r.chunk.id.clone(),
                source_id: r.chunk.source_id.clone(),
                text: r.chunk.text.clone(),
                start_offset: r.chunk.start_offset,
                end_offset: r.chunk.end_offset,
                distance,
            })
            .collect())
    }
}

#[async_trait]
impl VectorWriter for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> anyhow::Result<usize> {
        let incoming = chunks
            .iter()
            .map(|chunk| -> anyhow::Result<StoredChunk> {
                let vector = chunk
                    .embedding
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("chunk '{}' has no embedding", chunk.id))?;
                Ok(StoredChunk { chunk: Chunk { embedding: None, ..chunk.clone() }, vector })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut rows = self.rows.write();
        for stored in incoming {
            match rows.iter_mut().find(|r| r.chunk.id == stored.chunk.id) {
                Some(existing) => *existing = stored,
                None => rows.push(stored),
            }
        }
        Ok(chunks.len())
    }

    async fn delete_source(&self, source_id: &str) -> anyhow::Result<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| r.chunk.source_id != source_id);
        Ok(before - rows.len())
    }

    async fn delete_chunk(&self, chunk_id: &str) -> anyhow::Result<bool> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| r.chunk.id != chunk_id);
        Ok(rows.len() < before)
    }
}
