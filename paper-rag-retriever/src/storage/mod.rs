//! Persistence for built indexes.
//!
//! An index is saved as one unit: the build metadata plus every chunk's text,
//! provenance and vector keyed by its position. Loading validates that the
//! stored collections still line up before handing back a [`CorpusIndex`].
//!
//! ```text
//! CorpusIndex ── save ──> IndexStore (SqliteIndexStore: <base>/.paper-rag.db)
//!             <── load ──
//! ```

use crate::error::Result;
use crate::retrieval::corpus_index::{ChunkMetadata, CorpusIndex, IndexMetadata};
use async_trait::async_trait;
use paper_rag_embed::EmbeddingProvider;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub mod sqlite_store;

pub use sqlite_store::SqliteIndexStore;

/// File name of the index database inside the base directory
pub const STORE_FILE_NAME: &str = ".paper-rag.db";

pub fn store_path(base: &Path) -> PathBuf {
    base.join(STORE_FILE_NAME)
}

/// A stored chunk without its vector, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredChunk {
    pub position: usize,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Somewhere a [`CorpusIndex`] can be written and read back.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Replace whatever index is stored with `index`
    async fn save(&self, index: &CorpusIndex) -> Result<()>;

    /// Read the stored index back, checking that it is internally consistent
    async fn load(&self) -> Result<CorpusIndex>;

    /// Build metadata of the stored index, if there is one
    async fn info(&self) -> Result<Option<IndexMetadata>>;

    /// Up to `limit` chunks in position order
    async fn list_chunks(&self, limit: usize) -> Result<Vec<StoredChunk>>;

    /// [`load`](Self::load), then refuse an index built by a different model
    /// or normalization than `provider`.
    async fn load_for(&self, provider: &dyn EmbeddingProvider) -> Result<CorpusIndex> {
        let index = self.load().await?;
        index.info().embedding.check_compatible(provider)?;
        Ok(index)
    }
}
