//! The built corpus: vectors, chunk texts and chunk metadata aligned by position.
//!
//! Position `i` names the same chunk in all three collections. A [`CorpusIndex`]
//! can only be constructed with collections of equal length, and it is never
//! mutated afterwards, so it can be shared behind an `Arc` by any number of
//! concurrent retrievals.

use crate::document::{Document, UNKNOWN};
use crate::error::{Result, RetrieverError};
use crate::retrieval::flat_index::FlatIndex;
use chrono::{DateTime, Utc};
use paper_rag_context::{ChunkingConfig, SectionChunk, passage};
use paper_rag_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Provenance and bibliographic fields for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_document_id: String,
    pub section_index: usize,
    pub section_title: String,
    pub chunk_index_in_section: usize,
    pub pmid: String,
    pub journal: String,
    pub year: String,
    /// Author names joined by `"; "`
    pub authors: String,
    pub doi: String,
}

impl ChunkMetadata {
    /// Attach `document`'s identity to `chunk`. Absent bibliographic fields become [`UNKNOWN`].
    pub fn new(document: &Document, chunk: &SectionChunk) -> Self {
        let md = document.metadata.as_ref();
        let field = |value: Option<&String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        let authors = match md {
            Some(md) if !md.authors.is_empty() => md.authors.join("; "),
            _ => UNKNOWN.to_string(),
        };

        Self {
            source_document_id: document.id.clone(),
            section_index: chunk.section_index,
            section_title: chunk.section_title.clone(),
            chunk_index_in_section: chunk.chunk_index_in_section,
            pmid: field(md.and_then(|m| m.pmid.as_ref())),
            journal: field(md.and_then(|m| m.journal.as_ref())),
            year: field(md.and_then(|m| m.year.as_ref())),
            authors,
            doi: field(md.and_then(|m| m.doi.as_ref())),
        }
    }

    /// `text` under this chunk's citation header
    pub fn passage(&self, text: &str) -> String {
        passage(&self.source_document_id, &self.section_title, text)
    }
}

/// The embedding model that produced an index's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelMetadata {
    /// Provider of the embedding model (e.g., "fastembed")
    pub provider: String,
    /// Name of the embedding model (e.g., "all-minilm-l6-v2")
    pub model_name: String,
    pub dimension: usize,
    pub normalized: bool,
}

impl EmbeddingModelMetadata {
    pub fn from_provider(provider: &dyn EmbeddingProvider) -> Self {
        Self {
            provider: provider.provider_name().to_string(),
            model_name: provider.model_name().to_string(),
            dimension: provider.embedding_dimension(),
            normalized: provider.normalized(),
        }
    }

    /// Create a unique identifier for this model configuration
    pub fn model_id(&self) -> String {
        let normalized_part = if self.normalized { "norm" } else { "raw" };
        format!(
            "{}:{}:{}:{}",
            self.provider, self.model_name, self.dimension, normalized_part
        )
    }

    /// Fail unless `provider` would produce vectors comparable to the stored ones.
    pub fn check_compatible(&self, provider: &dyn EmbeddingProvider) -> Result<()> {
        let current = Self::from_provider(provider);
        let mismatch = |field: &'static str, stored: String, current: String| {
            Err(RetrieverError::IncompatibleIndex {
                field,
                stored,
                current,
            })
        };

        if self.provider != current.provider {
            return mismatch("provider", self.provider.clone(), current.provider);
        }
        if self.model_name != current.model_name {
            return mismatch("model", self.model_name.clone(), current.model_name);
        }
        if self.dimension != current.dimension {
            return mismatch(
                "dimension",
                self.dimension.to_string(),
                current.dimension.to_string(),
            );
        }
        if self.normalized != current.normalized {
            return mismatch(
                "normalization",
                self.normalized.to_string(),
                current.normalized.to_string(),
            );
        }
        Ok(())
    }
}

/// How an index was built. Stored alongside the chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub embedding: EmbeddingModelMetadata,
    pub chunking: ChunkingConfig,
    pub chunk_count: usize,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
    /// Version of paper-rag-retriever that built the index
    pub builder_version: String,
}

impl IndexMetadata {
    pub fn new(
        embedding: EmbeddingModelMetadata,
        chunking: ChunkingConfig,
        chunk_count: usize,
        document_count: usize,
    ) -> Self {
        Self {
            embedding,
            chunking,
            chunk_count,
            document_count,
            created_at: Utc::now(),
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Summary numbers for an index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub dimension: usize,
    /// Distinct (document, section) pairs that produced at least one chunk
    pub section_count: usize,
    pub average_words_per_chunk: f64,
}

/// One position of the index, borrowed from all three collections.
#[derive(Debug, Clone, Copy)]
pub struct IndexedChunk<'a> {
    pub position: usize,
    pub text: &'a str,
    pub metadata: &'a ChunkMetadata,
    pub embedding: &'a [f32],
}

#[derive(Debug, Clone)]
pub struct CorpusIndex {
    index: FlatIndex,
    texts: Vec<String>,
    metadata: Vec<ChunkMetadata>,
    info: IndexMetadata,
}

impl CorpusIndex {
    /// Assemble an index, checking that all collections line up.
    pub fn new(
        index: FlatIndex,
        texts: Vec<String>,
        metadata: Vec<ChunkMetadata>,
        info: IndexMetadata,
    ) -> Result<Self> {
        if texts.len() != index.len() || metadata.len() != index.len() {
            return Err(RetrieverError::misaligned(format!(
                "{} vectors, {} texts, {} metadata records",
                index.len(),
                texts.len(),
                metadata.len()
            )));
        }
        if info.chunk_count != index.len() {
            return Err(RetrieverError::misaligned(format!(
                "metadata records {} chunks but the index holds {}",
                info.chunk_count,
                index.len()
            )));
        }
        if info.embedding.dimension != index.dimension() {
            return Err(RetrieverError::DimensionMismatch {
                expected: info.embedding.dimension,
                actual: index.dimension(),
            });
        }

        Ok(Self {
            index,
            texts,
            metadata,
            info,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn flat_index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn info(&self) -> &IndexMetadata {
        &self.info
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    pub fn chunk(&self, position: usize) -> Option<IndexedChunk<'_>> {
        Some(IndexedChunk {
            position,
            text: self.texts.get(position)?,
            metadata: self.metadata.get(position)?,
            embedding: self.index.vector(position)?,
        })
    }

    /// Every chunk in position order
    pub fn chunks(&self) -> impl Iterator<Item = IndexedChunk<'_>> + '_ {
        (0..self.len()).filter_map(|position| self.chunk(position))
    }

    pub fn stats(&self) -> IndexStats {
        let sections: HashSet<(&str, usize)> = self
            .metadata
            .iter()
            .map(|m| (m.source_document_id.as_str(), m.section_index))
            .collect();
        let total_words: usize = self
            .texts
            .iter()
            .map(|t| t.split_whitespace().count())
            .sum();
        let average_words_per_chunk = if self.texts.is_empty() {
            0.0
        } else {
            total_words as f64 / self.texts.len() as f64
        };

        IndexStats {
            chunk_count: self.len(),
            document_count: self.info.document_count,
            dimension: self.dimension(),
            section_count: sections.len(),
            average_words_per_chunk,
        }
    }
}
