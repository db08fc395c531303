//! Embedding providers usable without an external model service.
//!
//! Providers must return L2-normalized vectors of the same dimensionality for
//! a given `embedder_id`.

pub mod cached;
pub mod hashing;

pub use cached::CachedEmbeddingProvider;
pub use hashing::HashingEmbedder;
