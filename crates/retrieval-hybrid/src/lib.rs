//! Hybrid retrieval: vector and BM25 results merged with Reciprocal Rank
//! Fusion, behind a cache-aside layer with layered fallbacks.
pub mod cache;
pub mod engine;
pub mod fusion;
pub mod stats;

pub use cache::{search_cache_key, InMemoryCache, ResultCache};
pub use engine::HybridSearchEngine;
pub use fusion::{fuse, DEFAULT_RRF_K};
pub use stats::{SearchStats, StatsSnapshot};
