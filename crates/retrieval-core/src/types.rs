//! Domain types shared by the lexical, vector and hybrid engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// An immutable unit of searchable text.
///
/// - `id`: globally unique chunk identifier
/// - `source_id`: the content item (video, document) the chunk was cut from
/// - `text`: the payload; never empty once ingested
/// - `start_offset`/`end_offset`: position within the source (seconds for
///   transcripts, characters for documents)
/// - `embedding`: present only while a chunk travels through ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source_id: String,
    pub text: String,
    pub start_offset: f64,
    pub end_offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            text: text.into(),
            start_offset: 0.0,
            end_offset: 0.0,
            embedding: None,
        }
    }

    pub fn with_offsets(mut self, start: f64, end: f64) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A chunk paired with an engine-specific relevance.
///
/// Vector relevance is a distance transform in `[0, 1]`; BM25 relevance is an
/// unbounded non-negative score; fused relevance is an RRF sum. Higher is
/// always better, but values are only comparable within one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk: Chunk,
    pub relevance: f32,
}

impl ScoredResult {
    pub fn new(chunk: Chunk, relevance: f32) -> Self {
        Self { chunk, relevance }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }
}

/// One row returned by a nearest-neighbor query, ascending by `distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRow {
    pub chunk_id: ChunkId,
    pub source_id: String,
    pub text: String,
    pub start_offset: f64,
    pub end_offset: f64,
    pub distance: f32,
}

impl NeighborRow {
    pub fn into_chunk(self) -> Chunk {
        Chunk {
            id: self.chunk_id,
            source_id: self.source_id,
            text: self.text,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            embedding: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    #[default]
    Hybrid,
    VectorOnly,
    KeywordOnly,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Hybrid => "hybrid",
            SearchStrategy::VectorOnly => "vector-only",
            SearchStrategy::KeywordOnly => "keyword-only",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(SearchStrategy::Hybrid),
            "vector-only" | "vector" => Ok(SearchStrategy::VectorOnly),
            "keyword-only" | "keyword" => Ok(SearchStrategy::KeywordOnly),
            other => Err(Error::InvalidConfig(format!("unknown search strategy '{other}'"))),
        }
    }
}

fn default_top_k() -> usize { 5 }
fn default_rrf_k() -> usize { 60 }
fn default_cache_enabled() -> bool { true }
fn default_cache_ttl_seconds() -> u64 { 3600 }

/// Per-call search options. Built fresh for every request and never mutated
/// once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub source_filter: Option<String>,
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Candidates requested from each sub-search in hybrid mode.
    /// `None` means `2 * top_k`.
    #[serde(default)]
    pub vector_oversample: Option<usize>,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            source_filter: None,
            strategy: SearchStrategy::default(),
            vector_oversample: None,
            rrf_k: default_rrf_k(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

impl SearchConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_source_filter(mut self, source_id: impl Into<String>) -> Self {
        self.source_filter = Some(source_id.into());
        self
    }

    pub fn with_vector_oversample(mut self, oversample: usize) -> Self {
        self.vector_oversample = Some(oversample);
        self
    }

    pub fn with_rrf_k(mut self, k: usize) -> Self {
        self.rrf_k = k;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_ttl_seconds(mut self, ttl: u64) -> Self {
        self.cache_ttl_seconds = ttl;
        self
    }

    /// Candidate count for each hybrid sub-search; never below `top_k`.
    pub fn effective_oversample(&self) -> usize {
        self.vector_oversample.unwrap_or(self.top_k.saturating_mul(2)).max(self.top_k)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be positive".into()));
        }
        if self.rrf_k == 0 {
            return Err(Error::InvalidConfig("rrf_k must be positive".into()));
        }
        if self.cache_ttl_seconds == 0 {
            return Err(Error::InvalidConfig("cache_ttl_seconds must be positive".into()));
        }
        Ok(())
    }
}
