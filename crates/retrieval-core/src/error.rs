use std::fmt;

use thiserror::Error;

/// Which half of a vector sub-search failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStage {
    Embedding,
    Store,
}

impl fmt::Display for VectorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorStage::Embedding => f.write_str("embedding"),
            VectorStage::Store => f.write_str("vector store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ingest failed: {0}")]
    Ingest(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Vector search unavailable ({stage} failed)")]
    VectorUnavailable {
        stage: VectorStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Lexical index is not ready")]
    LexicalNotReady,

    #[error("All search fallbacks exhausted")]
    Exhausted {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for failures a caller may recover from by switching strategy.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::VectorUnavailable { .. } | Error::LexicalNotReady)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
