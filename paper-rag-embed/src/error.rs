//! Error types for the embedding system

use std::path::PathBuf;

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems detected before any model is touched, failures
/// while downloading or loading a model, and failures while generating vectors.
///
/// # Error Categories
///
/// - **Configuration Errors**: Invalid settings, unknown model names, missing files
/// - **Initialization Errors**: Failures during model download or loading
/// - **Runtime Errors**: Problems during actual embedding generation
/// - **IO Errors**: File system access issues
/// - **External Errors**: Failures from dependencies
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model files are not found or invalid
    #[error("Model file not found: {path}")]
    ModelFileNotFound { path: PathBuf },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// The model name is neither a built-in FastEmbed model nor backed by a HuggingFace repository
    #[error("Unknown embedding model '{name}'. Set a HuggingFace repository or use one of: {known}")]
    UnknownModel { name: String, known: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A provider returned the wrong number of vectors or vectors of the wrong width
    #[error("Invalid embedding output: {message}")]
    InvalidOutput { message: String },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wrap an error raised while downloading or loading a model.
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Wrap an error raised while generating embeddings.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    pub fn invalid_output<S: Into<String>>(message: S) -> Self {
        Self::InvalidOutput {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with the configuration
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EmbedError::invalid_config("batch_size must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid model configuration: batch_size must be at least 1"
        );

        let err = EmbedError::UnknownModel {
            name: "mystery".to_string(),
            known: "all-minilm-l6-v2".to_string(),
        };
        assert!(err.to_string().contains("'mystery'"));

        let err: EmbedError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, EmbedError::Io { .. }));
    }

    #[test]
    fn test_embedding_gen_wraps_model_errors() {
        // fastembed reports inference failures as anyhow errors
        let err = EmbedError::embedding_gen(anyhow::anyhow!("token sequence too long"));
        assert!(matches!(err, EmbedError::EmbeddingGeneration { .. }));
        assert_eq!(
            err.to_string(),
            "Embedding generation failed: token sequence too long"
        );
        assert!(std::error::Error::source(&err).is_some());

        let err = EmbedError::model_init(anyhow::anyhow!("onnx graph rejected"));
        assert!(matches!(err, EmbedError::ModelInitialization { .. }));
    }
}
