//! # paper-rag-embed
//!
//! Text embedding for the paper retrieval pipeline. Turns ordered batches of
//! passages into fixed-width `f32` vectors behind one async trait, with local
//! ONNX models via FastEmbed as the production provider.
//!
//! ## Features
//!
//! - **Local ONNX Models**: Run embedding models locally without external API calls
//! - **Injectable Providers**: Wrap any function as a provider with [`FnEmbeddingProvider`]
//! - **Model Caching**: Loaded models are shared across providers with the same configuration
//! - **HuggingFace Integration**: Download ONNX models into an explicit cache directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use paper_rag_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default_with_path("/tmp/models")).await?;
//!
//! let texts = vec![
//!     "p53 mutations are common in human cancers".to_string(),
//!     "CRISPR enables targeted genome editing".to_string(),
//! ];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: Model selection and cache location
//! - [`provider`]: The [`EmbeddingProvider`] trait and its implementations
//! - [`downloader`]: HuggingFace model downloading
//! - [`error`]: Error types and result handling

pub mod config;
pub mod downloader;
pub mod error;
pub mod provider;

pub use config::{DEFAULT_MODEL_NAME, EmbedConfig};
pub use downloader::{ModelDownloader, download_model};
pub use error::{EmbedError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingResult, FastEmbedProvider, FnEmbeddingProvider,
    builtin_model_names, l2_normalize,
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_creation() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::default_with_path(temp_dir.path());

        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert!(!config.is_huggingface_model());
        assert!(builtin_model_names().contains(&DEFAULT_MODEL_NAME));
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let provider: Box<dyn EmbeddingProvider> = Box::new(FnEmbeddingProvider::new(
            "length",
            1,
            |texts: &[String]| texts.iter().map(|t| vec![t.len() as f32]).collect(),
        ));
        let v = provider.embed_text("abcd").await.unwrap();
        assert_eq!(v, vec![4.0]);
    }
}
