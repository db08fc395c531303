//! retrieval-text
//!
//! Bilingual tokenizer, from-scratch BM25 scoring and the snapshot-publishing
//! `LexicalIndex` used as the keyword side of hybrid search.
pub mod bm25;
pub mod index;
pub mod tokenize;

pub use bm25::Bm25Index;
pub use index::LexicalIndex;
pub use tokenize::{prepare, remove_stop_words, tokenize};
