//! Wiring shared by the `retrieval-*` binaries: config, chunk loading and
//! engine construction.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use retrieval_core::config::{expand_path, EngineSettings, ResultCacheBackend, VectorBackend};
use retrieval_core::traits::{EmbeddingProvider, VectorStore, VectorWriter};
use retrieval_core::types::Chunk;
use retrieval_hybrid::{HybridSearchEngine, InMemoryCache};
use retrieval_text::LexicalIndex;
use retrieval_vector::{CachedEmbeddingProvider, HashingEmbedder, InMemoryVectorStore, LanceVectorStore, VectorQueryAdapter};

pub type Engine = HybridSearchEngine<LexicalIndex>;

const EMBEDDING_MEMO_CAPACITY: usize = 10_000;

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Every `*.json` file under `dir` holding an array of chunks, in path order.
pub fn load_chunks(dir: &Path) -> Result<Vec<Chunk>> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "json"))
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    let mut chunks = Vec::new();
    for path in paths {
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut batch: Vec<Chunk> =
            serde_json::from_str(&raw).with_context(|| format!("parsing chunks in {}", path.display()))?;
        info!(file = %path.display(), chunks = batch.len(), "loaded chunk file");
        chunks.append(&mut batch);
    }
    if chunks.is_empty() {
        warn!(dir = %dir.display(), "no chunks found");
    }
    Ok(chunks)
}

async fn vector_backend(settings: &EngineSettings) -> Result<(Arc<dyn VectorStore>, Arc<dyn VectorWriter>)> {
    match settings.vector_backend {
        VectorBackend::Memory => {
            let store = Arc::new(InMemoryVectorStore::new());
            Ok((store.clone(), store))
        }
        VectorBackend::Lance => {
            let dir = expand_path(&settings.lance_dir);
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let store = Arc::new(LanceVectorStore::open(&dir, &settings.lance_table, settings.embedding_dim).await?);
            Ok((store.clone(), store))
        }
    }
}

/// Build the engine described by `settings`, embed `chunks` with a progress
/// bar and index them.
pub async fn build_engine(settings: &EngineSettings, chunks: Vec<Chunk>) -> Result<Engine> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CachedEmbeddingProvider::new(
        Arc::new(HashingEmbedder::new(settings.embedding_dim)),
        EMBEDDING_MEMO_CAPACITY,
    ));
    let (store, writer) = vector_backend(settings).await?;
    let adapter = VectorQueryAdapter::new(embedder.clone(), store);
    let mut engine = HybridSearchEngine::new(Arc::new(LexicalIndex::new()), adapter).with_writer(writer);
    if settings.result_cache == ResultCacheBackend::Memory {
        engine = engine.with_cache(Arc::new(InMemoryCache::new()));
    }

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut embedded = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let chunk = match chunk.embedding {
            Some(_) => chunk,
            None => {
                let vector = embedder.embed(&chunk.text).await?;
                chunk.with_embedding(vector)
            }
        };
        pb.inc(1);
        embedded.push(chunk);
    }
    pb.finish_with_message("embedded");

    let count = engine.index_chunks(embedded).await?;
    info!(chunks = count, backend = ?settings.vector_backend, "engine ready");
    Ok(engine)
}
