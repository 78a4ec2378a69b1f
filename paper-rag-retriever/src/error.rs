//! Error type shared by the retrieval pipeline

use paper_rag_context::ChunkError;
use paper_rag_embed::EmbedError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RetrieverError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// Bad chunk size or overlap
    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Caller passed an argument outside its domain, e.g. `k == 0`
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A vector's width does not match the index
    #[error("Dimension mismatch: index has dimension {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned a different number of vectors than it was given texts
    #[error("Embedding count mismatch: {expected} texts but {actual} embeddings")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    /// Index, texts and metadata disagree about which chunk lives at a position
    #[error("Index collections are misaligned: {message}")]
    Misaligned { message: String },

    /// A persisted index failed validation on load
    #[error("Stored index is corrupt: {message}")]
    CorruptIndex { message: String },

    /// A persisted index was built with a different embedding configuration
    #[error("Stored index was built with {field} '{stored}', but the query provider uses '{current}'")]
    IncompatibleIndex {
        field: &'static str,
        stored: String,
        current: String,
    },

    #[error("No index found at {path}")]
    IndexNotFound { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrieverError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn corrupt<S: Into<String>>(message: S) -> Self {
        Self::CorruptIndex {
            message: message.into(),
        }
    }

    pub fn misaligned<S: Into<String>>(message: S) -> Self {
        Self::Misaligned {
            message: message.into(),
        }
    }
}
