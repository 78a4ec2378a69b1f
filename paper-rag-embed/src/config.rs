//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in model used when nothing else is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-minilm-l6-v2";

/// ONNX file fetched from a HuggingFace repository unless configured otherwise.
pub const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";

/// Configuration for embedding models.
///
/// The model cache location is part of the configuration: every file a provider
/// downloads or loads lives under [`EmbedConfig::cache_dir`]. Nothing is read
/// from or written to process environment variables.
///
/// The configuration is serializable so that the index can record which model
/// produced its vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Directory holding downloaded and cached model files
    pub cache_dir: PathBuf,
    /// Name of the embedding model to use
    pub model_name: String,
    /// HuggingFace model repository (e.g., "BAAI/bge-small-en-v1.5")
    pub hf_model_repo: Option<String>,
    /// HuggingFace model revision/branch (e.g., "main")
    pub hf_revision: Option<String>,
    /// Path of the ONNX file inside the HuggingFace repository
    pub onnx_file: String,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
}

impl EmbedConfig {
    /// Create a configuration for a built-in FastEmbed model.
    pub fn new<P: AsRef<Path>>(cache_dir: P, model_name: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            model_name: model_name.into(),
            hf_model_repo: None,
            hf_revision: Some("main".to_string()),
            onnx_file: DEFAULT_ONNX_FILE.to_string(),
            batch_size: 32,
            normalize: true,
        }
    }

    /// Create a configuration for an ONNX model hosted on HuggingFace.
    pub fn from_huggingface<P: AsRef<Path>>(
        cache_dir: P,
        model_name: impl Into<String>,
        hf_repo: impl Into<String>,
    ) -> Self {
        Self {
            hf_model_repo: Some(hf_repo.into()),
            // Smaller batch for larger models
            batch_size: 8,
            ..Self::new(cache_dir, model_name)
        }
    }

    /// Create the default built-in model configuration rooted at a given path
    pub fn default_with_path<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self::new(cache_dir, DEFAULT_MODEL_NAME)
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the HuggingFace revision (builder style)
    pub fn with_revision<S: Into<String>>(self, revision: S) -> Self {
        Self {
            hf_revision: Some(revision.into()),
            ..self
        }
    }

    /// Set the ONNX file path inside the HuggingFace repository (builder style)
    pub fn with_onnx_file<S: Into<String>>(self, onnx_file: S) -> Self {
        Self {
            onnx_file: onnx_file.into(),
            ..self
        }
    }

    /// Get the full path to the model directory
    pub fn model_path(&self) -> PathBuf {
        self.cache_dir.join(&self.model_name)
    }

    /// Local path of the ONNX model file
    pub fn onnx_model_path(&self) -> PathBuf {
        self.model_path().join(&self.onnx_file)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_path().join("tokenizer.json")
    }

    pub fn model_config_path(&self) -> PathBuf {
        self.model_path().join("config.json")
    }

    pub fn special_tokens_map_path(&self) -> PathBuf {
        self.model_path().join("special_tokens_map.json")
    }

    /// Optional; a minimal one is generated when missing
    pub fn tokenizer_config_path(&self) -> PathBuf {
        self.model_path().join("tokenizer_config.json")
    }

    /// Directory used by the HuggingFace client for its own download cache
    pub fn hf_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("hf-hub")
    }

    /// Check if this is a HuggingFace model
    pub fn is_huggingface_model(&self) -> bool {
        self.hf_model_repo.is_some()
    }

    /// Get the HuggingFace repository name
    pub fn hf_repo(&self) -> Option<&str> {
        self.hf_model_repo.as_deref()
    }

    /// Get the HuggingFace revision
    pub fn hf_revision(&self) -> &str {
        self.hf_revision.as_deref().unwrap_or("main")
    }

    /// Validate the settings that do not depend on downloaded files.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if self.is_huggingface_model() && self.onnx_file.trim().is_empty() {
            return Err(EmbedError::invalid_config(
                "onnx_file must be set for HuggingFace models",
            ));
        }
        Ok(())
    }

    /// Validate that all files needed to load a HuggingFace model exist
    pub fn validate_files(&self) -> Result<()> {
        let paths_to_check = [
            ("ONNX model", self.onnx_model_path()),
            ("tokenizer", self.tokenizer_path()),
            ("config", self.model_config_path()),
            ("special tokens map", self.special_tokens_map_path()),
        ];

        for (name, path) in paths_to_check {
            if !path.exists() {
                tracing::error!("Missing {}: {}", name, path.display());
                return Err(EmbedError::ModelFileNotFound { path });
            }
        }

        tracing::debug!("Model validation successful for: {}", self.model_name);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::default_with_path("models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_creation() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new(temp_dir.path(), "test-model");

        assert_eq!(config.model_name, "test-model");
        assert_eq!(config.batch_size, 32);
        assert!(config.normalize);
        assert!(!config.is_huggingface_model());
        assert_eq!(config.model_path(), temp_dir.path().join("test-model"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_paths() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::from_huggingface(temp_dir.path(), "bge-small", "BAAI/bge-small-en-v1.5");

        let expected_base = temp_dir.path().join("bge-small");
        assert_eq!(
            config.onnx_model_path(),
            expected_base.join("onnx").join("model.onnx")
        );
        assert_eq!(config.tokenizer_path(), expected_base.join("tokenizer.json"));
        assert_eq!(config.model_config_path(), expected_base.join("config.json"));
        assert_eq!(
            config.special_tokens_map_path(),
            expected_base.join("special_tokens_map.json")
        );
        assert_eq!(config.hf_cache_dir(), temp_dir.path().join("hf-hub"));
        assert_eq!(config.hf_repo(), Some("BAAI/bge-small-en-v1.5"));
        assert_eq!(config.batch_size, 8);
    }

    #[test]
    fn test_config_builder_methods() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new(temp_dir.path(), "test-model")
            .with_batch_size(64)
            .with_normalize(false)
            .with_revision("v2")
            .with_onnx_file("onnx/model_quantized.onnx");

        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
        assert_eq!(config.hf_revision(), "v2");
        assert_eq!(
            config.onnx_model_path(),
            temp_dir.path().join("test-model/onnx/model_quantized.onnx")
        );
    }

    #[test]
    fn test_config_validation() {
        let config = EmbedConfig::default().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));

        let config = EmbedConfig::new("models", "  ");
        assert!(config.validate().is_err());

        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::from_huggingface(temp_dir.path(), "missing", "org/missing");
        assert!(matches!(
            config.validate_files(),
            Err(EmbedError::ModelFileNotFound { .. })
        ));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = EmbedConfig::from_huggingface("models", "bge-small", "BAAI/bge-small-en-v1.5");
        let json = serde_json::to_string(&config).unwrap();
        let restored: EmbedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.cache_dir, PathBuf::from("models"));
        assert_eq!(config.hf_revision(), "main");
    }
}
