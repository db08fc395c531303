#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod eval;
pub mod traits;
pub mod types;

pub use error::{Error, Result, VectorStage};
pub use types::{Chunk, ChunkId, ScoredResult, SearchConfig, SearchStrategy};
