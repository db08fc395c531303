//! Cache-aside layer over a best-effort `DistributedCache`.
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use retrieval_core::traits::DistributedCache;
use retrieval_core::types::{ScoredResult, SearchConfig, SearchStrategy};

use crate::stats::SearchStats;

const KEY_VERSION: u32 = 1;

/// Everything that can change a result set. Fusion parameters are zeroed for
/// single-list strategies.
#[derive(Serialize)]
struct CacheKeyParts<'a> {
    version: u32,
    strategy: SearchStrategy,
    source_filter: Option<&'a str>,
    top_k: usize,
    oversample: usize,
    rrf_k: usize,
    query: &'a str,
}

/// `search:v1:<strategy>:<blake3 of the serialized effective config + query>`.
///
/// TTL and the cache toggle are not part of the key.
pub fn search_cache_key(query: &str, config: &SearchConfig) -> serde_json::Result<String> {
    let (oversample, rrf_k) = match config.strategy {
        SearchStrategy::Hybrid => (config.effective_oversample(), config.rrf_k),
        SearchStrategy::VectorOnly | SearchStrategy::KeywordOnly => (0, 0),
    };
    let parts = CacheKeyParts {
        version: KEY_VERSION,
        strategy: config.strategy,
        source_filter: config.source_filter.as_deref(),
        top_k: config.top_k,
        oversample,
        rrf_k,
        query,
    };
    let bytes = serde_json::to_vec(&parts)?;
    Ok(format!("search:v{KEY_VERSION}:{}:{}", config.strategy, blake3::hash(&bytes).to_hex()))
}

/// Wraps an optional cache; every failure is a miss or a skipped write.
#[derive(Clone, Default)]
pub struct ResultCache {
    backend: Option<Arc<dyn DistributedCache>>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn DistributedCache>) -> Self {
        Self { backend: Some(backend) }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn lookup(&self, key: &str, stats: &SearchStats) -> Option<Vec<ScoredResult>> {
        let backend = self.backend.as_ref()?;
        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, key, "cache read failed, treating as miss");
                stats.record_cache_error();
                return None;
            }
        };
        match serde_json::from_str::<Vec<ScoredResult>>(&raw) {
            Ok(results) => Some(results),
            Err(e) => {
                warn!(error = %e, key, "cached entry did not decode, treating as miss");
                stats.record_cache_error();
                None
            }
        }
    }

    pub async fn store(&self, key: &str, results: &[ScoredResult], ttl: Duration, stats: &SearchStats) {
        let Some(backend) = self.backend.as_ref() else { return };
        let value = match serde_json::to_string(results) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "could not encode results for cache");
                stats.record_cache_error();
                return;
            }
        };
        if let Err(e) = backend.set(key, &value, ttl).await {
            warn!(error = %e, key, "cache write failed");
            stats.record_cache_error();
        } else {
            debug!(key, results = results.len(), "cached search results");
        }
    }
}

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

struct CacheEntry {
    value: String,
    /// `None` when the TTL is too large to represent.
    expires: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires.map_or(true, |at| at > now)
    }
}

/// Process-local `DistributedCache` with per-entry expiry.
///
/// Bounded by LRU eviction; every write also drops expired entries.
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl InMemoryCache {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().iter().filter(|(_, entry)| entry.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn sweep_expired(entries: &mut LruCache<String, CacheEntry>, now: Instant) {
    let expired: Vec<String> =
        entries.iter().filter(|(_, entry)| !entry.is_live(now)).map(|(key, _)| key.clone()).collect();
    for key in expired {
        entries.pop(&key);
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let live = entries.get(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value.clone());
        if live.is_none() {
            entries.pop(key);
        }
        Ok(live)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        sweep_expired(&mut entries, now);
        if ttl.is_zero() {
            entries.pop(key);
            return Ok(());
        }
        let entry = CacheEntry { value: value.to_string(), expires: now.checked_add(ttl) };
        entries.put(key.to_string(), entry);
        Ok(())
    }
}
