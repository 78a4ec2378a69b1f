//! Corpus indexing: papers in, [`CorpusIndex`] out.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Documents → ChunkingStrategy → (text, ChunkMetadata) → EmbeddingProvider → FlatIndex
//!                                        ↓                                     ↓
//!                                 position order ──────────────────────→ CorpusIndex
//! ```
//!
//! Chunks from all documents are concatenated in document order; the place of
//! a chunk in that sequence is its position in every collection of the index.
//! Texts are embedded in batches, in order, and every batch is checked: the
//! provider must return one vector per text, each as wide as the index.

use crate::document::Document;
use crate::error::{Result, RetrieverError};
use paper_rag_context::ChunkingConfig;
use paper_rag_embed::EmbeddingProvider;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::chunking_strategy::ChunkingStrategy;
use super::corpus_index::{ChunkMetadata, CorpusIndex, EmbeddingModelMetadata, IndexMetadata};
use super::flat_index::FlatIndex;

/// Texts sent to the provider per call unless configured otherwise
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// Configuration for the indexing engine
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingEngineConfig {
    /// Chunking configuration
    pub chunking_config: ChunkingConfig,
    /// Number of chunk texts handed to the embedding provider per call
    pub batch_size: usize,
}

impl Default for IndexingEngineConfig {
    fn default() -> Self {
        Self {
            chunking_config: ChunkingConfig::default(),
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

impl IndexingEngineConfig {
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self {
            chunking_config,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reject settings that would fail midway through a build.
    pub fn validate(&self) -> Result<()> {
        self.chunking_config.validate()?;
        if self.batch_size == 0 {
            return Err(RetrieverError::invalid_argument(
                "embedding batch size must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Counters for one build
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub documents_processed: usize,
    pub documents_without_metadata: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub processing_time: Duration,
}

/// Builds a [`CorpusIndex`] with one embedding provider.
pub struct IndexingEngine<'p> {
    config: IndexingEngineConfig,
    chunking_strategy: ChunkingStrategy,
    provider: &'p dyn EmbeddingProvider,
    stats: ProcessingStats,
}

impl<'p> IndexingEngine<'p> {
    /// Validates the configuration; nothing is chunked or embedded yet.
    pub fn new(config: IndexingEngineConfig, provider: &'p dyn EmbeddingProvider) -> Result<Self> {
        config.validate()?;
        let chunking_strategy = ChunkingStrategy::new(config.chunking_config)?;
        Ok(Self {
            config,
            chunking_strategy,
            provider,
            stats: ProcessingStats::default(),
        })
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Chunk, embed and index `documents`, in order.
    pub async fn build(&mut self, documents: &[Document]) -> Result<CorpusIndex> {
        let start_time = Instant::now();
        self.stats = ProcessingStats::default();
        info!(
            "Indexing {} documents with {} ({})",
            documents.len(),
            self.provider.model_name(),
            self.provider.provider_name()
        );

        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        for document in documents {
            if document.metadata.is_none() {
                warn!(
                    "Document {} has no bibliographic metadata; indexing it with \"unknown\" fields",
                    document.id
                );
                self.stats.documents_without_metadata += 1;
            }

            let chunks = self.chunking_strategy.chunk_document(document);
            if chunks.is_empty() {
                warn!("Document {} produced no chunks", document.id);
            }
            for chunk in chunks {
                metadata.push(ChunkMetadata::new(document, &chunk));
                texts.push(chunk.chunk_text);
            }
            self.stats.documents_processed += 1;
        }
        self.stats.chunks_created = texts.len();
        info!("Created {} chunks", texts.len());

        let index = self.embed_all(&texts).await?;

        let info = IndexMetadata::new(
            EmbeddingModelMetadata::from_provider(self.provider),
            *self.chunking_strategy.config(),
            index.len(),
            documents.len(),
        );
        let corpus = CorpusIndex::new(index, texts, metadata, info)?;

        self.stats.processing_time = start_time.elapsed();
        info!(
            "Indexed {} chunks from {} documents in {:.2}s",
            corpus.len(),
            documents.len(),
            self.stats.processing_time.as_secs_f64()
        );
        Ok(corpus)
    }

    async fn embed_all(&mut self, texts: &[String]) -> Result<FlatIndex> {
        let mut index = FlatIndex::new(self.provider.embedding_dimension());

        for batch in texts.chunks(self.config.batch_size) {
            let result = self.provider.embed_texts(batch).await?;
            if result.embeddings.len() != batch.len() {
                return Err(RetrieverError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    actual: result.embeddings.len(),
                });
            }
            for embedding in &result.embeddings {
                index.add(embedding)?;
            }
            self.stats.embeddings_generated += batch.len();
            debug!(
                "Embedded {}/{} chunks",
                self.stats.embeddings_generated,
                texts.len()
            );
        }

        if index.len() != texts.len() {
            return Err(RetrieverError::EmbeddingCountMismatch {
                expected: texts.len(),
                actual: index.len(),
            });
        }
        Ok(index)
    }
}

/// Build an index over `documents` with `provider`.
///
/// ```
/// use paper_rag_embed::FnEmbeddingProvider;
/// use paper_rag_retriever::document::Document;
/// use paper_rag_retriever::retrieval::indexing_engine::{IndexingEngineConfig, build_index};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let provider = FnEmbeddingProvider::new("length", 1, |texts: &[String]| {
///     texts.iter().map(|t| vec![t.len() as f32]).collect()
/// });
/// let docs = vec![Document::new("PMC1", "TITLE\n\nRESULTS\nAmyloid rose.")];
/// let index = build_index(&docs, &provider, &IndexingEngineConfig::default()).await.unwrap();
/// assert_eq!(index.len(), 2);
/// # });
/// ```
pub async fn build_index(
    documents: &[Document],
    provider: &dyn EmbeddingProvider,
    config: &IndexingEngineConfig,
) -> Result<CorpusIndex> {
    IndexingEngine::new(config.clone(), provider)?
        .build(documents)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PaperMetadata, UNKNOWN};
    use paper_rag_embed::{EmbedError, EmbeddingResult, FnEmbeddingProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn word_count_provider() -> FnEmbeddingProvider<impl Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync> {
        FnEmbeddingProvider::new("words", 2, |texts: &[String]| {
            texts
                .iter()
                .map(|t| vec![t.split_whitespace().count() as f32, t.len() as f32])
                .collect()
        })
    }

    fn small_config(chunk_size: usize, overlap: usize) -> IndexingEngineConfig {
        IndexingEngineConfig::new(ChunkingConfig::new(chunk_size, overlap).unwrap())
    }

    #[tokio::test]
    async fn test_positions_follow_document_order() {
        let docs = vec![
            Document::new("PMC1", "Title one\n\nBODY\na b c d e f g"),
            Document::new("PMC2", "Title two"),
        ];
        let provider = word_count_provider();
        let index = build_index(&docs, &provider, &small_config(4, 1)).await.unwrap();

        let ids: Vec<&str> = index
            .metadata()
            .iter()
            .map(|m| m.source_document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["PMC1", "PMC1", "PMC1", "PMC1", "PMC2"]);

        let body: Vec<(usize, usize)> = index.metadata()[1..4]
            .iter()
            .map(|m| (m.section_index, m.chunk_index_in_section))
            .collect();
        assert_eq!(body, vec![(1, 0), (1, 1), (1, 2)]);

        for chunk in index.chunks() {
            assert_eq!(chunk.embedding[0], chunk.text.split_whitespace().count() as f32);
        }
        assert_eq!(index.info().document_count, 2);
        assert_eq!(index.info().embedding.model_name, "words");
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let calls = AtomicUsize::new(0);
        let provider = FnEmbeddingProvider::new("seq", 1, |texts: &[String]| {
            calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| vec![t.trim_start_matches("chunk").parse::<f32>().unwrap()])
                .collect()
        });
        let text = (0..7)
            .map(|i| format!("chunk{i}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let docs = vec![Document::new("PMC1", text)];

        let config = small_config(5, 0).with_batch_size(3);
        let index = build_index(&docs, &provider, &config).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let values: Vec<f32> = index.flat_index().vectors().map(|v| v[0]).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_metadata_recovered_with_unknown() {
        let docs = vec![
            Document::new("PMC1", "Some title").with_metadata(PaperMetadata {
                pmid: Some("42".to_string()),
                ..PaperMetadata::default()
            }),
            Document::new("PMC2", "Other title"),
        ];
        let provider = word_count_provider();
        let mut engine = IndexingEngine::new(IndexingEngineConfig::default(), &provider).unwrap();
        let index = engine.build(&docs).await.unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.metadata()[0].pmid, "42");
        assert_eq!(index.metadata()[1].pmid, UNKNOWN);
        assert_eq!(index.metadata()[1].journal, UNKNOWN);
        assert_eq!(engine.stats().documents_without_metadata, 1);
        assert!(logs_contain("PMC2 has no bibliographic metadata"));
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let provider = word_count_provider();
        let index = build_index(&[], &provider, &IndexingEngineConfig::default())
            .await
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_embedding() {
        let calls = AtomicUsize::new(0);
        let provider = FnEmbeddingProvider::new("never", 1, |texts: &[String]| {
            calls.fetch_add(1, Ordering::SeqCst);
            vec![vec![0.0]; texts.len()]
        });
        let docs = vec![Document::new("PMC1", "text")];

        let bad_chunking = IndexingEngineConfig::new(ChunkingConfig {
            chunk_size: 100,
            overlap: 100,
            ..ChunkingConfig::default()
        });
        let err = build_index(&docs, &provider, &bad_chunking).await.unwrap_err();
        assert!(matches!(err, RetrieverError::Chunking(_)));

        let bad_batch = IndexingEngineConfig::default().with_batch_size(0);
        let err = build_index(&docs, &provider, &bad_batch).await.unwrap_err();
        assert!(matches!(err, RetrieverError::InvalidArgument { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Returns one vector too few, bypassing the output check of `FnEmbeddingProvider`
    struct ShortProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed_texts(&self, texts: &[String]) -> paper_rag_embed::Result<EmbeddingResult> {
            Ok(EmbeddingResult::new(vec![vec![0.0]; texts.len().saturating_sub(1)]))
        }
        fn embedding_dimension(&self) -> usize {
            1
        }
        fn provider_name(&self) -> &str {
            "short"
        }
        fn model_name(&self) -> &str {
            "short"
        }
        fn normalized(&self) -> bool {
            false
        }
    }

    /// Returns vectors of varying width
    struct RaggedProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for RaggedProvider {
        async fn embed_texts(&self, texts: &[String]) -> paper_rag_embed::Result<EmbeddingResult> {
            Ok(EmbeddingResult::new(
                (0..texts.len()).map(|i| vec![0.0; i + 1]).collect(),
            ))
        }
        fn embedding_dimension(&self) -> usize {
            1
        }
        fn provider_name(&self) -> &str {
            "ragged"
        }
        fn model_name(&self) -> &str {
            "ragged"
        }
        fn normalized(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_provider_output_is_checked() {
        let docs = vec![Document::new("PMC1", "one\n\ntwo\n\nthree")];

        let err = build_index(&docs, &ShortProvider, &IndexingEngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrieverError::EmbeddingCountMismatch {
                expected: 3,
                actual: 2
            }
        ));

        let err = build_index(&docs, &RaggedProvider, &IndexingEngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieverError::DimensionMismatch { .. }));

        let wrong_width = FnEmbeddingProvider::new("wide", 2, |t: &[String]| vec![vec![0.0; 3]; t.len()]);
        let err = build_index(&docs, &wrong_width, &IndexingEngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrieverError::Embedding(EmbedError::InvalidOutput { .. })
        ));
    }
}
