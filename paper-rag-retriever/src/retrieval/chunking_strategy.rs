use crate::document::Document;
use crate::error::Result;
use paper_rag_context::{ChunkingConfig, SectionChunk, SectionChunker};
use std::path::Path;

/// Strategy for chunking papers - delegates the windowing to paper-rag-context
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    chunker: SectionChunker,
}

impl ChunkingStrategy {
    /// Create a new chunking strategy, rejecting an invalid configuration up front
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunker: SectionChunker::new(config)?,
        })
    }

    pub fn config(&self) -> &ChunkingConfig {
        self.chunker.config()
    }

    /// Chunk a paper's text in section order
    pub fn chunk_document(&self, document: &Document) -> Vec<SectionChunk> {
        let chunks = self.chunker.get_chunks(&document.text);

        tracing::debug!(
            "Chunked {} into {} chunks (chunk size: {}, overlap: {})",
            document.id,
            chunks.len(),
            self.config().chunk_size,
            self.config().overlap
        );

        chunks
    }

    /// Check if a file is a paper text written by the acquisition step (`PMC*.txt`)
    pub fn should_index_file(file_path: &Path) -> bool {
        let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        filename.starts_with("PMC")
            && file_path.extension().and_then(|ext| ext.to_str()) == Some("txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_strategy() {
        let config = ChunkingConfig::new(4, 1).unwrap();
        let strategy = ChunkingStrategy::new(config).unwrap();

        let doc = Document::new("PMC1", "TITLE: Tau\n\nMETHODS\none two three four five six");
        let chunks = strategy.chunk_document(&doc);

        // "TITLE: Tau" is one section, METHODS has 7 words -> windows [0:4], [3:7]
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].section_title, "TITLE: Tau");
        assert_eq!(chunks[1].chunk_text, "METHODS one two three");
        assert_eq!(chunks[2].chunk_text, "three four five six");
        assert_eq!(chunks[2].section_index, 1);
        assert_eq!(chunks[2].chunk_index_in_section, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChunkingConfig {
            chunk_size: 10,
            overlap: 10,
            ..ChunkingConfig::default()
        };
        assert!(ChunkingStrategy::new(config).is_err());
    }

    #[test]
    fn test_should_index_file() {
        assert!(ChunkingStrategy::should_index_file(Path::new("papers/PMC11350031.txt")));
        assert!(ChunkingStrategy::should_index_file(Path::new("PMC1.txt")));

        assert!(!ChunkingStrategy::should_index_file(Path::new("PMC1_metadata.json")));
        assert!(!ChunkingStrategy::should_index_file(Path::new("README.txt")));
        assert!(!ChunkingStrategy::should_index_file(Path::new("PMC1.xml")));
        assert!(!ChunkingStrategy::should_index_file(Path::new("papers/")));
    }
}
