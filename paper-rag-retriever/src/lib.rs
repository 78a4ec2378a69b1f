//! paper-rag-retriever: chunk research papers, embed them and retrieve grounding context
//!
//! Papers are split into sections on blank lines, each section is cut into
//! overlapping word windows, and every window is embedded into a flat L2 index.
//! A question is embedded the same way and answered with the nearest chunks,
//! each carrying the paper and section it came from.
//!
//! ## Key Modules
//!
//! - **[`document`]**: Papers and their bibliographic metadata, loaded from disk
//! - **[`retrieval`]**: Chunking, index building, nearest-neighbour search and context formatting
//! - **[`storage`]**: Saving and loading built indexes (SQLite)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_rag_embed::{EmbedConfig, FastEmbedProvider};
//! use paper_rag_retriever::document::load_papers;
//! use paper_rag_retriever::retrieval::context::build_prompt;
//! use paper_rag_retriever::retrieval::indexing_engine::{IndexingEngineConfig, build_index};
//! use paper_rag_retriever::retrieval::retriever::retrieve;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//! let papers = load_papers(Path::new("papers")).await?;
//! let index = build_index(&papers, &provider, &IndexingEngineConfig::default()).await?;
//!
//! let question = "How does tau spread between neurons?";
//! let results = retrieve(question, &provider, &index, 5).await?;
//! println!("{}", build_prompt(question, &results));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! papers/ → load_papers → ChunkingStrategy → EmbeddingProvider → CorpusIndex → SQLite
//!                                                                    ↓
//!                                     question → retrieve → format_context / build_prompt
//! ```

pub mod document;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use document::{Document, PaperMetadata, load_papers};
pub use error::{Result, RetrieverError};
pub use retrieval::context::{build_prompt, format_context};
pub use retrieval::corpus_index::{ChunkMetadata, CorpusIndex, IndexMetadata, IndexStats};
pub use retrieval::indexing_engine::{IndexingEngine, IndexingEngineConfig, build_index};
pub use retrieval::retriever::{RetrievalResult, Retriever, retrieve};
pub use storage::{IndexStore, SqliteIndexStore};
