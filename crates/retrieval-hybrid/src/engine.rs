//! Hybrid search orchestration.
//!
//! One request walks `cache check -> strategy dispatch -> (fuse) -> cache
//! write`. Fallback rungs:
//! - keyword-only with no usable lexical index answers from the vector path;
//! - hybrid without the lexical list returns the vector list truncated to `top_k`;
//! - hybrid whose vector sub-search fails retries vector-only once, and a
//!   failed retry surfaces as `Error::Exhausted`.
//!
//! Every successful answer is cached, including fallback answers; errors never are.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use retrieval_core::error::{Error, Result};
use retrieval_core::traits::{DistributedCache, TextIndexer, VectorWriter};
use retrieval_core::types::{Chunk, ScoredResult, SearchConfig, SearchStrategy};
use retrieval_vector::VectorQueryAdapter;

use crate::cache::{search_cache_key, ResultCache};
use crate::fusion::fuse;
use crate::stats::{SearchStats, StatsSnapshot};

struct Outcome {
    results: Vec<ScoredResult>,
    degraded: bool,
}

impl Outcome {
    fn full(results: Vec<ScoredResult>) -> Self { Self { results, degraded: false } }
    fn degraded(results: Vec<ScoredResult>) -> Self { Self { results, degraded: true } }
}

fn truncated(mut results: Vec<ScoredResult>, top_k: usize) -> Vec<ScoredResult> {
    results.truncate(top_k);
    results
}

/// Keep results from `source_id` (if any), then cut to `limit`.
fn filter_by_source(results: Vec<ScoredResult>, source_id: Option<&str>, limit: usize) -> Vec<ScoredResult> {
    match source_id {
        Some(source_id) => results.into_iter().filter(|r| r.chunk.source_id == source_id).take(limit).collect(),
        None => truncated(results, limit),
    }
}

pub struct HybridSearchEngine<TI: TextIndexer + 'static> {
    text: Arc<TI>,
    vector: VectorQueryAdapter,
    writer: Option<Arc<dyn VectorWriter>>,
    cache: ResultCache,
    stats: SearchStats,
    ingest_lock: tokio::sync::Mutex<()>,
}

impl<TI: TextIndexer + 'static> HybridSearchEngine<TI> {
    pub fn new(text: Arc<TI>, vector: VectorQueryAdapter) -> Self {
        Self {
            text,
            vector,
            writer: None,
            cache: ResultCache::disabled(),
            stats: SearchStats::default(),
            ingest_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Ingestion also writes embedded chunks here.
    pub fn with_writer(mut self, writer: Arc<dyn VectorWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn DistributedCache>) -> Self {
        self.cache = ResultCache::new(cache);
        self
    }

    pub fn text_index(&self) -> &Arc<TI> { &self.text }

    pub fn stats(&self) -> StatsSnapshot { self.stats.snapshot() }

    pub async fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<ScoredResult>> {
        config.validate()?;
        self.stats.record_search();

        let key = if config.cache_enabled && self.cache.is_enabled() {
            match search_cache_key(query, config) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "could not build cache key, bypassing cache");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = key.as_deref() {
            if let Some(hit) = self.cache.lookup(key, &self.stats).await {
                self.stats.record_cache_hit();
                debug!(key, results = hit.len(), "cache hit");
                return Ok(hit);
            }
            self.stats.record_cache_miss();
        }

        let outcome = match config.strategy {
            SearchStrategy::VectorOnly => Outcome::full(self.vector_only(query, config).await?),
            SearchStrategy::KeywordOnly => self.keyword_only(query, config).await?,
            SearchStrategy::Hybrid => self.hybrid(query, config).await?,
        };

        if let Some(key) = key.as_deref() {
            let ttl = Duration::from_secs(config.cache_ttl_seconds);
            self.cache.store(key, &outcome.results, ttl, &self.stats).await;
        }
        info!(
            strategy = %config.strategy,
            top_k = config.top_k,
            results = outcome.results.len(),
            degraded = outcome.degraded,
            "search complete"
        );
        Ok(outcome.results)
    }

    async fn vector_only(&self, query: &str, config: &SearchConfig) -> Result<Vec<ScoredResult>> {
        self.vector.query(query, config.top_k, config.source_filter.as_deref()).await
    }

    /// BM25 off the async runtime. The source filter is applied after scoring,
    /// so a filtered request scores the whole corpus.
    async fn lexical(&self, query: &str, limit: usize, source_filter: Option<&str>) -> Result<Vec<ScoredResult>> {
        let k = match source_filter {
            Some(_) => self.text.document_count().max(limit),
            None => limit,
        };
        let text = Arc::clone(&self.text);
        let owned = query.to_string();
        let results = tokio::task::spawn_blocking(move || text.search(&owned, k))
            .await
            .map_err(|e| Error::Operation(format!("lexical search task failed: {e}")))??;
        Ok(filter_by_source(results, source_filter, limit))
    }

    async fn keyword_only(&self, query: &str, config: &SearchConfig) -> Result<Outcome> {
        let filter = config.source_filter.as_deref();
        let failure = if self.text.is_ready() {
            match self.lexical(query, config.top_k, filter).await {
                Ok(results) => return Ok(Outcome::full(results)),
                Err(e) => e,
            }
        } else {
            Error::LexicalNotReady
        };
        warn!(error = %failure, "keyword search unavailable, falling back to vector search");
        self.stats.record_keyword_fallback();
        match self.vector_only(query, config).await {
            Ok(results) => Ok(Outcome::degraded(results)),
            Err(e) => {
                self.stats.record_exhausted();
                Err(Error::Exhausted { source: Box::new(e) })
            }
        }
    }

    async fn hybrid(&self, query: &str, config: &SearchConfig) -> Result<Outcome> {
        let oversample = config.effective_oversample();
        let filter = config.source_filter.as_deref();

        if !self.text.is_ready() {
            debug!("lexical index not ready, hybrid search uses the vector list only");
            self.stats.record_hybrid_lexical_skip();
            return match self.vector.query(query, oversample, filter).await {
                Ok(results) => Ok(Outcome::degraded(truncated(results, config.top_k))),
                Err(e) => self.retry_vector_only(query, config, e).await,
            };
        }

        let (vector, lexical) = tokio::join!(
            self.vector.query(query, oversample, filter),
            self.lexical(query, oversample, filter),
        );
        let vector = match vector {
            Ok(results) => results,
            Err(e) => return self.retry_vector_only(query, config, e).await,
        };
        let lexical = match lexical {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "lexical sub-search failed, returning vector results");
                self.stats.record_hybrid_lexical_skip();
                return Ok(Outcome::degraded(truncated(vector, config.top_k)));
            }
        };
        debug!(vector = vector.len(), keyword = lexical.len(), "fusing result lists");
        let fused = fuse([("vector", vector.as_slice()), ("keyword", lexical.as_slice())], config.rrf_k);
        Ok(Outcome::full(truncated(fused, config.top_k)))
    }

    async fn retry_vector_only(&self, query: &str, config: &SearchConfig, cause: Error) -> Result<Outcome> {
        warn!(error = %cause, "vector sub-search failed, retrying vector-only");
        self.stats.record_hybrid_vector_retry();
        match self.vector_only(query, config).await {
            Ok(results) => Ok(Outcome::degraded(results)),
            Err(e) => {
                self.stats.record_exhausted();
                Err(Error::Exhausted { source: Box::new(e) })
            }
        }
    }

    /// Replace the lexical corpus with `chunks`, writing their vectors first.
    ///
    /// Chunks without an embedding are embedded when a writer is configured.
    /// Returns the number of chunks indexed.
    pub async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;
        let chunks = self.write_vectors(chunks).await?;
        let count = chunks.len();
        self.rebuild(chunks).await?;
        Ok(count)
    }

    /// Add or replace chunks, keeping the rest of the current lexical corpus.
    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;
        let chunks = self.write_vectors(chunks).await?;
        let count = chunks.len();
        let incoming: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let mut merged: Vec<Chunk> = self.text.chunks().into_iter().filter(|c| !incoming.contains(c.id.as_str())).collect();
        merged.extend(chunks);
        self.rebuild(merged).await?;
        Ok(count)
    }

    /// Drop every chunk of `source_id`. Returns how many were removed.
    pub async fn remove_source(&self, source_id: &str) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;
        let from_vector = match &self.writer {
            Some(writer) => writer
                .delete_source(source_id)
                .await
                .map_err(|e| Error::Operation(format!("vector delete for source '{source_id}' failed: {e}")))?,
            None => 0,
        };
        let current = self.text.chunks();
        let before = current.len();
        let kept: Vec<Chunk> = current.into_iter().filter(|c| c.source_id != source_id).collect();
        let from_text = before - kept.len();
        if from_text > 0 {
            self.rebuild(kept).await?;
        }
        info!(source_id, from_vector, from_text, "removed source");
        Ok(from_vector.max(from_text))
    }

    pub async fn remove_chunk(&self, chunk_id: &str) -> Result<()> {
        let _guard = self.ingest_lock.lock().await;
        let from_vector = match &self.writer {
            Some(writer) => writer
                .delete_chunk(chunk_id)
                .await
                .map_err(|e| Error::Operation(format!("vector delete for chunk '{chunk_id}' failed: {e}")))?,
            None => false,
        };
        let current = self.text.chunks();
        let before = current.len();
        let kept: Vec<Chunk> = current.into_iter().filter(|c| c.id != chunk_id).collect();
        let from_text = kept.len() < before;
        if from_text {
            self.rebuild(kept).await?;
        }
        if !from_vector && !from_text {
            return Err(Error::NotFound(format!("chunk '{chunk_id}'")));
        }
        Ok(())
    }

    /// Validate, embed what is missing and upsert into the writer.
    /// Returned chunks carry no embedding.
    async fn write_vectors(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if let Some(bad) = chunks.iter().find(|c| c.text.trim().is_empty()) {
            return Err(Error::Ingest(format!("chunk '{}' has empty text", bad.id)));
        }
        let Some(writer) = &self.writer else {
            return Ok(chunks.into_iter().map(|c| Chunk { embedding: None, ..c }).collect());
        };
        let embedder = self.vector.embedder();
        let dim = embedder.dim();
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = match chunk.embedding.clone() {
                Some(vector) => vector,
                None => embedder
                    .embed(&chunk.text)
                    .await
                    .map_err(|e| Error::Ingest(format!("embedding chunk '{}' failed: {e}", chunk.id)))?,
            };
            if vector.len() != dim {
                return Err(Error::Ingest(format!("chunk '{}' has {} dims, expected {dim}", chunk.id, vector.len())));
            }
            embedded.push(chunk.with_embedding(vector));
        }
        writer
            .upsert(&embedded)
            .await
            .map_err(|e| Error::Ingest(format!("vector upsert failed: {e}")))?;
        Ok(embedded.into_iter().map(|c| Chunk { embedding: None, ..c }).collect())
    }

    async fn rebuild(&self, chunks: Vec<Chunk>) -> Result<()> {
        let text = Arc::clone(&self.text);
        tokio::task::spawn_blocking(move || text.index(&chunks))
            .await
            .map_err(|e| Error::Operation(format!("lexical rebuild task failed: {e}")))?
    }
}
