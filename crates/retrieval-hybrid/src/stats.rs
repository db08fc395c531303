use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Out-of-band counters for cache behavior and degraded searches.
#[derive(Debug, Default)]
pub struct SearchStats {
    searches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    keyword_fallbacks: AtomicU64,
    hybrid_lexical_skips: AtomicU64,
    hybrid_vector_retries: AtomicU64,
    exhausted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub searches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    /// keyword-only requests answered by the vector path
    pub keyword_fallbacks: u64,
    /// hybrid requests answered without the lexical list
    pub hybrid_lexical_skips: u64,
    pub hybrid_vector_retries: u64,
    pub exhausted: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl SearchStats {
    pub fn record_search(&self) { bump(&self.searches) }
    pub fn record_cache_hit(&self) { bump(&self.cache_hits) }
    pub fn record_cache_miss(&self) { bump(&self.cache_misses) }
    pub fn record_cache_error(&self) { bump(&self.cache_errors) }
    pub fn record_keyword_fallback(&self) { bump(&self.keyword_fallbacks) }
    pub fn record_hybrid_lexical_skip(&self) { bump(&self.hybrid_lexical_skips) }
    pub fn record_hybrid_vector_retry(&self) { bump(&self.hybrid_vector_retries) }
    pub fn record_exhausted(&self) { bump(&self.exhausted) }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            keyword_fallbacks: self.keyword_fallbacks.load(Ordering::Relaxed),
            hybrid_lexical_skips: self.hybrid_lexical_skips.load(Ordering::Relaxed),
            hybrid_vector_retries: self.hybrid_vector_retries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}
