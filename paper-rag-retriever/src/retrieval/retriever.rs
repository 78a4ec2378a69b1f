//! Query-time lookup: embed a question, search the flat index, join provenance.

use crate::error::{Result, RetrieverError};
use paper_rag_embed::EmbeddingProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::corpus_index::{ChunkMetadata, CorpusIndex};

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Position of the chunk in the index
    pub position: usize,
    /// Squared Euclidean distance between query and chunk embeddings
    pub distance: f32,
    /// 0 for the nearest chunk
    pub rank: usize,
}

impl RetrievalResult {
    /// The chunk text under its citation header
    pub fn passage(&self) -> String {
        self.metadata.passage(&self.text)
    }
}

/// Return up to `k` chunks of `index` nearest to `query`.
///
/// `k == 0` is rejected before the provider is called. An empty index returns
/// no results. A provider whose vectors do not match the index width produces
/// [`RetrieverError::DimensionMismatch`].
pub async fn retrieve(
    query: &str,
    provider: &dyn EmbeddingProvider,
    index: &CorpusIndex,
    k: usize,
) -> Result<Vec<RetrievalResult>> {
    if k == 0 {
        return Err(RetrieverError::invalid_argument("k must be at least 1"));
    }
    if index.is_empty() {
        debug!("Index is empty, nothing to retrieve");
        return Ok(Vec::new());
    }

    let query_vector = provider.embed_text(query).await?;
    let neighbors = index.flat_index().search(&query_vector, k)?;

    neighbors
        .into_iter()
        .enumerate()
        .map(|(rank, neighbor)| {
            let chunk = index.chunk(neighbor.position).ok_or_else(|| {
                RetrieverError::misaligned(format!(
                    "search returned position {} outside the index",
                    neighbor.position
                ))
            })?;
            Ok(RetrievalResult {
                text: chunk.text.to_string(),
                metadata: chunk.metadata.clone(),
                position: neighbor.position,
                distance: neighbor.distance,
                rank,
            })
        })
        .collect()
}

/// A shared index paired with the provider that embeds queries for it.
///
/// Cloning is cheap; clones share the same index and provider.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<CorpusIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Arc<CorpusIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        retrieve(query, self.provider.as_ref(), &self.index, k).await
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("chunks", &self.index.len())
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_name())
            .finish()
    }
}
