pub mod text;

// Re-export the main chunking entry points for external use
pub use text::{
    ChunkError, ChunkingConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, Result, SECTION_SEPARATOR,
    Section, SectionChunk, SectionChunker, SectionTitleRule, chunk, passage, split_sections,
};
