//! Embedding memo keyed by `(content_hash, embedder_id)`.
//!
//! The memo is consulted before calling the wrapped provider and written
//! through on misses, so re-ingesting unchanged text or repeating a query
//! costs no model call. Once full, the least recently used vector is evicted.
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use retrieval_core::traits::EmbeddingProvider;

fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: String,
    embedder_id: String,
}

pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    entries: Mutex<LruCache<CacheKey, Vec<f32>>>,
    misses: AtomicUsize,
}

impl CachedEmbeddingProvider {
    /// `capacity` bounds the number of memoized vectors (at least one).
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner, entries: Mutex::new(LruCache::new(capacity)), misses: AtomicUsize::new(0) }
    }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }

    /// Calls that reached the wrapped provider.
    pub fn misses(&self) -> usize { self.misses.load(Ordering::Relaxed) }

    fn key(&self, text: &str) -> CacheKey {
        CacheKey { content_hash: hash_content(text), embedder_id: self.inner.embedder_id().to_string() }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }

    fn dim(&self) -> usize { self.inner.dim() }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let key = self.key(text);
        let hit = self.entries.lock().get(&key).cloned();
        if let Some(hit) = hit {
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        self.entries.lock().put(key, vector.clone());
        Ok(vector)
    }
}
