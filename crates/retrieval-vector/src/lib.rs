pub mod adapter;
pub mod embed_provider;
pub mod lance_store;
pub mod memory;
pub mod schema;

pub use adapter::{distance_to_relevance, VectorQueryAdapter};
pub use embed_provider::{CachedEmbeddingProvider, HashingEmbedder};
pub use lance_store::LanceVectorStore;
pub use memory::InMemoryVectorStore;
