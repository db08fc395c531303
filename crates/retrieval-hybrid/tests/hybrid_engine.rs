use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use retrieval_core::error::{Error, VectorStage};
use retrieval_core::traits::{DistributedCache, TextIndexer, VectorStore};
use retrieval_core::types::{Chunk, NeighborRow, ScoredResult, SearchConfig, SearchStrategy};
use retrieval_hybrid::{HybridSearchEngine, InMemoryCache};
use retrieval_text::LexicalIndex;
use retrieval_vector::{HashingEmbedder, InMemoryVectorStore, VectorQueryAdapter};

const CORPUS: [(&str, &str, &str); 4] = [
    ("c1", "video-1", "authentication with JWT tokens"),
    ("c2", "video-1", "React hooks and state"),
    ("c3", "video-2", "JWT tokens for secure authentication"),
    ("c4", "video-2", "vector databases store embeddings"),
];

fn corpus() -> Vec<Chunk> {
    CORPUS.iter().map(|(id, source, text)| Chunk::new(*id, *source, *text)).collect()
}

/// Returns rows in a fixed order, `0.1` apart, optionally failing the first calls.
struct ScriptedStore {
    order: Vec<&'static str>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    last_top_k: AtomicUsize,
}

impl ScriptedStore {
    fn new(order: &[&'static str]) -> Self {
        Self {
            order: order.to_vec(),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            last_top_k: AtomicUsize::new(0),
        }
    }

    fn failing(order: &[&'static str], failures: usize) -> Self {
        let store = Self::new(order);
        store.failures_left.store(failures, Ordering::SeqCst);
        store
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn nearest_neighbors(&self, _vector: &[f32], top_k: usize, source_filter: Option<&str>) -> anyhow::Result<Vec<NeighborRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_top_k.store(top_k, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("vector store unreachable");
        }
        Ok(self
            .order
            .iter()
            .filter_map(|id| CORPUS.iter().find(|(cid, _, _)| cid == id))
            .filter(|(_, source, _)| source_filter.map_or(true, |s| *source == s))
            .take(top_k)
            .enumerate()
            .map(|(i, (id, source, text))| NeighborRow {
                chunk_id: id.to_string(),
                source_id: source.to_string(),
                text: text.to_string(),
                start_offset: 0.0,
                end_offset: 1.0,
                distance: i as f32 * 0.1,
            })
            .collect())
    }
}

/// Real BM25 index with a search counter.
#[derive(Default)]
struct CountingText {
    inner: LexicalIndex,
    searches: AtomicUsize,
}

impl CountingText {
    fn searches(&self) -> usize { self.searches.load(Ordering::SeqCst) }
}

impl TextIndexer for CountingText {
    fn index(&self, chunks: &[Chunk]) -> retrieval_core::Result<()> { self.inner.index(chunks) }
    fn search(&self, query: &str, k: usize) -> retrieval_core::Result<Vec<ScoredResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, k)
    }
    fn is_ready(&self) -> bool { self.inner.is_ready() }
    fn document_count(&self) -> usize { self.inner.document_count() }
    fn chunks(&self) -> Vec<Chunk> { self.inner.snapshot().chunks().to_vec() }
}

struct BrokenCache;

#[async_trait]
impl DistributedCache for BrokenCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> { anyhow::bail!("cache down") }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> anyhow::Result<()> { anyhow::bail!("cache down") }
}

struct Harness {
    engine: HybridSearchEngine<CountingText>,
    text: Arc<CountingText>,
    store: Arc<ScriptedStore>,
}

async fn harness(store: ScriptedStore, build_lexical: bool) -> Harness {
    let text = Arc::new(CountingText::default());
    let store = Arc::new(store);
    let adapter = VectorQueryAdapter::new(Arc::new(HashingEmbedder::new(16)), store.clone());
    let engine = HybridSearchEngine::new(text.clone(), adapter).with_cache(Arc::new(InMemoryCache::new()));
    if build_lexical {
        engine.index_chunks(corpus()).await.expect("index");
    }
    Harness { engine, text, store }
}

fn ids(results: &[ScoredResult]) -> Vec<&str> {
    results.iter().map(|r| r.id()).collect()
}

#[tokio::test]
async fn keyword_only_returns_chunks_containing_the_query_terms() {
    let h = harness(ScriptedStore::new(&["c4", "c2", "c1", "c3"]), true).await;
    let config = SearchConfig::default().with_strategy(SearchStrategy::KeywordOnly).with_top_k(2);
    let results = h.engine.search("JWT authentication", &config).await.expect("search");
    assert_eq!(ids(&results), vec!["c1", "c3"]);
    assert_eq!(h.store.calls(), 0, "keyword search never touches the vector store");
    assert_eq!(h.text.searches(), 1);
}

#[tokio::test]
async fn keyword_only_falls_back_to_vector_when_index_not_built() {
    let h = harness(ScriptedStore::new(&["c4", "c2", "c1", "c3"]), false).await;
    let config = SearchConfig::default().with_strategy(SearchStrategy::KeywordOnly).with_top_k(2);
    let results = h.engine.search("JWT authentication", &config).await.expect("fallback");
    assert_eq!(ids(&results), vec!["c4", "c2"]);
    assert_eq!(h.text.searches(), 0);
    assert_eq!(h.engine.stats().keyword_fallbacks, 1);

    // The fallback answer is a successful answer and is cached.
    let again = h.engine.search("JWT authentication", &config).await.expect("fallback again");
    assert_eq!(again, results);
    assert_eq!(h.store.calls(), 1);
    assert_eq!(h.engine.stats().cache_hits, 1);
}

#[tokio::test]
async fn hybrid_without_lexical_index_is_cached() {
    let h = harness(ScriptedStore::new(&["c4", "c2", "c1", "c3"]), false).await;
    let config = SearchConfig::default().with_top_k(2);
    let first = h.engine.search("JWT authentication", &config).await.expect("first");
    let second = h.engine.search("JWT authentication", &config).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(h.store.calls(), 1, "second call issues no vector query");
    assert_eq!(h.engine.stats().hybrid_lexical_skips, 1);
}

#[tokio::test]
async fn huge_top_k_is_served_without_overflow() {
    let h = harness(ScriptedStore::new(&["c4", "c2", "c1", "c3"]), true).await;
    let config = SearchConfig::default().with_top_k(usize::MAX / 2 + 1);
    let results = h.engine.search("JWT authentication", &config).await.expect("hybrid");
    assert_eq!(results.len(), 4);
    assert_eq!(h.store.last_top_k.load(Ordering::SeqCst), usize::MAX);
    let keyword = config.clone().with_strategy(SearchStrategy::KeywordOnly);
    assert_eq!(h.engine.search("JWT", &keyword).await.expect("keyword").len(), 4);
}

#[tokio::test]
async fn hybrid_without_lexical_index_equals_vector_only() {
    let h = harness(ScriptedStore::new(&["c4", "c2", "c1", "c3"]), false).await;
    let hybrid = SearchConfig::default().with_top_k(3);
    let vector_only = hybrid.clone().with_strategy(SearchStrategy::VectorOnly);
    let a = h.engine.search("JWT authentication", &hybrid).await.expect("hybrid");
    let b = h.engine.search("JWT authentication", &vector_only).await.expect("vector");
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
    assert_eq!(h.engine.stats().hybrid_lexical_skips, 1);
}

#[tokio::test]
async fn hybrid_fuses_vector_and_keyword_ranks() {
    let h = harness(ScriptedStore::new(&["c4", "c1", "c2", "c3"]), true).await;
    let config = SearchConfig::default().with_top_k(2);
    let results = h.engine.search("JWT authentication", &config).await.expect("search");
    // c1 is 2nd by vector and 1st by keyword; c4 leads the vector list only.
    assert_eq!(ids(&results), vec!["c1", "c4"]);
    let expected = 1.0 / 61.0 + 1.0 / 62.0;
    assert!((f64::from(results[0].relevance) - expected).abs() < 1e-6);
    assert_eq!(h.store.last_top_k.load(Ordering::SeqCst), config.effective_oversample());
    assert_eq!(h.text.searches(), 1);
}

#[tokio::test]
async fn hybrid_vector_failure_retries_vector_only() {
    let h = harness(ScriptedStore::failing(&["c3", "c1", "c2", "c4"], 1), true).await;
    let config = SearchConfig::default().with_top_k(2);
    let results = h.engine.search("JWT authentication", &config).await.expect("retry");
    assert_eq!(ids(&results), vec!["c3", "c1"]);
    assert_eq!(h.store.calls(), 2);
    assert_eq!(h.store.last_top_k.load(Ordering::SeqCst), 2, "retry uses the vector-only shape");
    assert_eq!(h.engine.stats().hybrid_vector_retries, 1);
}

#[tokio::test]
async fn hybrid_exhausted_surfaces_last_cause_and_caches_nothing() {
    let h = harness(ScriptedStore::failing(&["c1", "c2", "c3", "c4"], 2), true).await;
    let config = SearchConfig::default().with_top_k(2);
    let err = h.engine.search("JWT authentication", &config).await.unwrap_err();
    match &err {
        Error::Exhausted { source } => {
            assert!(matches!(**source, Error::VectorUnavailable { stage: VectorStage::Store, .. }))
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
    assert_eq!(h.engine.stats().exhausted, 1);

    // The store recovers; the failed request left nothing in the cache.
    let results = h.engine.search("JWT authentication", &config).await.expect("recovered");
    assert_eq!(results.len(), 2);
    assert_eq!(h.store.calls(), 3);
}

#[tokio::test]
async fn second_identical_search_is_served_from_cache() {
    for strategy in [SearchStrategy::Hybrid, SearchStrategy::VectorOnly, SearchStrategy::KeywordOnly] {
        let h = harness(ScriptedStore::new(&["c4", "c1", "c2", "c3"]), true).await;
        let config = SearchConfig::default().with_strategy(strategy).with_top_k(3);
        let first = h.engine.search("JWT authentication", &config).await.expect("first");
        let (vector_calls, text_calls) = (h.store.calls(), h.text.searches());
        let second = h.engine.search("JWT authentication", &config).await.expect("second");
        assert_eq!(first, second, "{strategy}");
        assert_eq!(h.store.calls(), vector_calls, "{strategy}: no vector call on a hit");
        assert_eq!(h.text.searches(), text_calls, "{strategy}: no lexical call on a hit");
        let stats = h.engine.stats();
        assert_eq!((stats.cache_hits, stats.cache_misses), (1, 1), "{strategy}");

        // A different effective config is a different key.
        h.engine.search("JWT authentication", &config.clone().with_top_k(2)).await.expect("third");
        assert_eq!(h.engine.stats().cache_misses, 2, "{strategy}");
    }
}

#[tokio::test]
async fn disabled_cache_recomputes() {
    let h = harness(ScriptedStore::new(&["c1", "c2"]), false).await;
    let config = SearchConfig::default().with_strategy(SearchStrategy::VectorOnly).with_cache(false);
    h.engine.search("q", &config).await.expect("first");
    h.engine.search("q", &config).await.expect("second");
    assert_eq!(h.store.calls(), 2);
    assert_eq!(h.engine.stats().cache_hits, 0);
}

#[tokio::test]
async fn cache_failures_never_fail_a_search() {
    let text = Arc::new(CountingText::default());
    let store = Arc::new(ScriptedStore::new(&["c1", "c2", "c3"]));
    let adapter = VectorQueryAdapter::new(Arc::new(HashingEmbedder::new(16)), store.clone());
    let engine = HybridSearchEngine::new(text, adapter).with_cache(Arc::new(BrokenCache));
    let config = SearchConfig::default().with_strategy(SearchStrategy::VectorOnly).with_top_k(2);
    let results = engine.search("q", &config).await.expect("search despite cache");
    assert_eq!(ids(&results), vec!["c1", "c2"]);
    let stats = engine.stats();
    assert_eq!(stats.cache_errors, 2, "one failed read, one failed write");
    assert_eq!(stats.cache_misses, 1);
}

#[tokio::test]
async fn source_filter_holds_under_every_strategy() {
    for strategy in [SearchStrategy::Hybrid, SearchStrategy::VectorOnly, SearchStrategy::KeywordOnly] {
        let h = harness(ScriptedStore::new(&["c1", "c2", "c3", "c4"]), true).await;
        let config = SearchConfig::default()
            .with_strategy(strategy)
            .with_top_k(3)
            .with_source_filter("video-2");
        let results = h.engine.search("JWT authentication", &config).await.expect("search");
        assert!(!results.is_empty(), "{strategy}");
        assert!(results.iter().all(|r| r.chunk.source_id == "video-2"), "{strategy}: {:?}", ids(&results));
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_call() {
    let h = harness(ScriptedStore::new(&["c1"]), true).await;
    let err = h.engine.search("q", &SearchConfig::default().with_top_k(0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.text.searches(), 0);
}

fn ingest_engine() -> (HybridSearchEngine<LexicalIndex>, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let adapter = VectorQueryAdapter::new(Arc::new(HashingEmbedder::new(64)), store.clone());
    let engine = HybridSearchEngine::new(Arc::new(LexicalIndex::new()), adapter).with_writer(store.clone());
    (engine, store)
}

#[tokio::test]
async fn ingestion_feeds_both_indexes() {
    let (engine, store) = ingest_engine();
    assert_eq!(engine.index_chunks(corpus()).await.expect("index"), 4);
    assert_eq!(store.len(), 4);
    assert_eq!(engine.text_index().document_count(), 4);
    assert!(engine.text_index().chunks().iter().all(|c| c.embedding.is_none()));

    let config = SearchConfig::default().with_top_k(2);
    let results = engine.search("JWT authentication", &config).await.expect("hybrid");
    assert_eq!(results.len(), 2);

    let extra = vec![Chunk::new("c5", "video-3", "state machines in Rust")];
    assert_eq!(engine.add_chunks(extra).await.expect("add"), 1);
    assert_eq!(engine.text_index().document_count(), 5);
    assert_eq!(store.len(), 5);

    assert_eq!(engine.remove_source("video-2").await.expect("remove source"), 2);
    assert_eq!(engine.text_index().document_count(), 3);
    assert_eq!(store.len(), 3);

    engine.remove_chunk("c5").await.expect("remove chunk");
    assert!(matches!(engine.remove_chunk("c5").await, Err(Error::NotFound(_))));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn ingestion_rejects_empty_text_and_wrong_dimensions() {
    let (engine, store) = ingest_engine();
    let blank = vec![Chunk::new("c1", "s", "ok"), Chunk::new("c2", "s", "   ")];
    assert!(matches!(engine.index_chunks(blank).await, Err(Error::Ingest(_))));
    let wrong_dim = vec![Chunk::new("c1", "s", "ok").with_embedding(vec![0.1; 3])];
    assert!(matches!(engine.index_chunks(wrong_dim).await, Err(Error::Ingest(_))));
    assert!(store.is_empty());
    assert!(!engine.text_index().is_ready());
}

#[tokio::test]
async fn empty_reindex_makes_keyword_search_fall_back() {
    let (engine, _store) = ingest_engine();
    engine.index_chunks(corpus()).await.expect("index");
    engine.index_chunks(Vec::new()).await.expect("empty reindex");
    assert!(!engine.text_index().is_ready());
    let config = SearchConfig::default().with_strategy(SearchStrategy::KeywordOnly).with_top_k(2);
    let results = engine.search("JWT", &config).await.expect("vector fallback");
    assert_eq!(results.len(), 2);
    assert_eq!(engine.stats().keyword_fallbacks, 1);
}
