//! Embedding provider implementations
//!
//! Every provider turns an ordered batch of texts into one fixed-width `f32`
//! vector per text, in input order. The retrieval side only ever sees the
//! [`EmbeddingProvider`] trait, so the same code runs against a real ONNX model
//! ([`FastEmbedProvider`]) or an injected function ([`FnEmbeddingProvider`]).

use crate::config::EmbedConfig;
use crate::downloader::download_model;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, InitOptions, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::fs;

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when empty.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Scale `vector` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// The result holds exactly one vector per input, in input order, each of
    /// length [`embedding_dimension`](Self::embedding_dimension).
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_output("No embedding generated for text"))
    }

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Name of the model behind this provider
    fn model_name(&self) -> &str;

    /// Whether returned vectors are L2-normalized
    fn normalized(&self) -> bool;
}

/// Check that a provider returned one vector of width `dimension` per input.
pub fn check_output(inputs: usize, dimension: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if embeddings.len() != inputs {
        return Err(EmbedError::invalid_output(format!(
            "expected {inputs} embeddings, got {}",
            embeddings.len()
        )));
    }
    if let Some((i, bad)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != dimension)
    {
        return Err(EmbedError::invalid_output(format!(
            "embedding {i} has dimension {}, expected {dimension}",
            bad.len()
        )));
    }
    Ok(())
}

/// Built-in FastEmbed models, addressable by name in [`EmbedConfig::model_name`].
const BUILTIN_MODELS: &[(&str, EmbeddingModel)] = &[
    ("all-minilm-l6-v2", EmbeddingModel::AllMiniLML6V2),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15),
    ("bge-large-en-v1.5", EmbeddingModel::BGELargeENV15),
    ("nomic-embed-text-v1.5", EmbeddingModel::NomicEmbedTextV15),
];

/// Names accepted for built-in models
pub fn builtin_model_names() -> Vec<&'static str> {
    BUILTIN_MODELS.iter().map(|(name, _)| *name).collect()
}

fn builtin_model(name: &str) -> Option<EmbeddingModel> {
    BUILTIN_MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, model)| model.clone())
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn model_cache() -> MutexGuard<'static, HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn lock_model(model: &Mutex<TextEmbedding>) -> Result<MutexGuard<'_, TextEmbedding>> {
    model
        .lock()
        .map_err(|_| EmbedError::invalid_config("embedding model lock poisoned"))
}

/// Run one probe text through a freshly loaded model to learn its width.
fn probe_dimension(model: &mut TextEmbedding) -> Result<usize> {
    let probe = model
        .embed(vec!["dimension probe".to_string()], None)
        .map_err(EmbedError::embedding_gen)?;
    match probe.first().map(|e| e.len()) {
        Some(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(EmbedError::invalid_output(
            "model produced an empty probe embedding",
        )),
    }
}

/// FastEmbed-based embedding provider using real ONNX models.
///
/// Built-in models are fetched by FastEmbed into `cache_dir`; models with a
/// HuggingFace repository are downloaded through [`crate::ModelDownloader`]
/// and loaded as user-defined ONNX models. Loaded models are shared through a
/// process-wide cache keyed by the full configuration.
///
/// ```no_run
/// use paper_rag_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
///
/// # async fn example() -> paper_rag_embed::Result<()> {
/// let provider = FastEmbedProvider::create(EmbedConfig::default_with_path("/tmp/models")).await?;
/// let vector = provider.embed_text("BRCA1 regulates DNA repair").await?;
/// assert_eq!(vector.len(), provider.embedding_dimension());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a provider without loading the model. Dimension is 0 until [`initialize`](Self::initialize).
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            config,
            model: None,
            dimension: 0,
        }
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Downloads (if needed) and loads the embedding model, reusing a cached instance when possible.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            self.config.model_name
        );

        let cache_key = self.create_cache_key()?;
        let cached = model_cache()
            .get(&cache_key)
            .map(|(model, dim)| (Arc::clone(model), *dim));

        let (model, dimension) = match cached {
            Some(entry) => {
                tracing::info!("Using cached model for: {}", self.config.model_name);
                entry
            }
            None => {
                let (model, dimension) = if self.config.is_huggingface_model() {
                    download_model(&self.config).await?;
                    self.load_user_defined_model().await?
                } else {
                    self.load_builtin_model().await?
                };
                let model = Arc::new(Mutex::new(model));
                model_cache().insert(cache_key, (Arc::clone(&model), dimension));
                (model, dimension)
            }
        };

        self.model = Some(model);
        self.dimension = dimension;
        self.validate_model().await
    }

    /// Create a cache key based on the model configuration
    fn create_cache_key(&self) -> Result<String> {
        let config_json = serde_json::to_string(&self.config)
            .map_err(|e| EmbedError::External { source: e.into() })?;

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(config_json.as_bytes());

        Ok(format!("v1:{:x}", hasher.finish()))
    }

    async fn load_builtin_model(&self) -> Result<(TextEmbedding, usize)> {
        let model_kind =
            builtin_model(&self.config.model_name).ok_or_else(|| EmbedError::UnknownModel {
                name: self.config.model_name.clone(),
                known: builtin_model_names().join(", "),
            })?;

        fs::create_dir_all(&self.config.cache_dir).await?;
        let cache_dir = self.config.cache_dir.clone();
        let model_name = self.config.model_name.clone();

        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Loading built-in embedding model: {}", model_name);

            let init_options = InitOptions::new(model_kind)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(false);

            let mut model = TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;
            let dimension = probe_dimension(&mut model)?;

            tracing::info!("Model loaded successfully. Dimension: {}", dimension);
            Ok((model, dimension))
        })
        .await?
    }

    /// Load a user-defined ONNX model from downloaded HuggingFace files
    async fn load_user_defined_model(&self) -> Result<(TextEmbedding, usize)> {
        self.config.validate_files()?;
        tracing::info!("Loading user-defined model: {}", self.config.model_name);

        let onnx_file = fs::read(self.config.onnx_model_path()).await?;
        let tokenizer_file = fs::read(self.config.tokenizer_path()).await?;
        let config_file = fs::read(self.config.model_config_path()).await?;
        let special_tokens_map_file = fs::read(self.config.special_tokens_map_path()).await?;

        let tokenizer_config_path = self.config.tokenizer_config_path();
        let tokenizer_config_file = if tokenizer_config_path.exists() {
            fs::read(&tokenizer_config_path).await?
        } else {
            let minimal_config = serde_json::json!({
                "clean_up_tokenization_spaces": true,
                "do_lower_case": false,
                "model_max_length": 512,
                "tokenizer_class": "BertTokenizer"
            });
            serde_json::to_vec_pretty(&minimal_config)
                .map_err(|e| EmbedError::External { source: e.into() })?
        };

        let tokenizer_files = TokenizerFiles {
            tokenizer_file,
            config_file,
            special_tokens_map_file,
            tokenizer_config_file,
        };
        let user_model = UserDefinedEmbeddingModel::new(onnx_file, tokenizer_files);

        let model_name = self.config.model_name.clone();
        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Initializing user-defined model: {}", model_name);

            let mut model =
                TextEmbedding::try_new_from_user_defined(user_model, Default::default())
                    .map_err(EmbedError::model_init)?;
            let dimension = probe_dimension(&mut model)?;

            tracing::info!(
                "User-defined model loaded successfully. Dimension: {}",
                dimension
            );
            Ok((model, dimension))
        })
        .await?
    }

    /// Validate that the model produces finite vectors of the expected width
    async fn validate_model(&self) -> Result<()> {
        let embedding = self.embed_text("validation test").await?;

        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_output(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name);
        Ok(())
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        model_cache().len()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let batch = batch.to_vec();
            let model = Arc::clone(model);

            let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", batch.len());
                let mut guard = lock_model(&model)?;
                guard
                    .embed(batch, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            all_embeddings.extend(embeddings);
        }

        if self.config.normalize {
            all_embeddings.iter_mut().for_each(|e| l2_normalize(e));
        }
        check_output(texts.len(), self.dimension, &all_embeddings)?;

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn normalized(&self) -> bool {
        self.config.normalize
    }
}

/// Provider backed by a plain function from texts to vectors.
///
/// This is how an application injects its own embedding capability (a remote
/// service client, a precomputed table) and how tests get deterministic vectors.
/// Output is checked: the function must return one vector of width `dimension`
/// per input.
///
/// ```
/// use paper_rag_embed::{EmbeddingProvider, FnEmbeddingProvider};
///
/// # tokio_test::block_on(async {
/// let provider = FnEmbeddingProvider::new("word-count", 1, |texts: &[String]| {
///     texts
///         .iter()
///         .map(|t| vec![t.split_whitespace().count() as f32])
///         .collect()
/// });
/// let vector = provider.embed_text("three word text").await.unwrap();
/// assert_eq!(vector, vec![3.0]);
/// # });
/// ```
pub struct FnEmbeddingProvider<F> {
    name: String,
    dimension: usize,
    normalize: bool,
    embed_fn: F,
}

impl<F> FnEmbeddingProvider<F>
where
    F: Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, dimension: usize, embed_fn: F) -> Self {
        Self {
            name: name.into(),
            dimension,
            normalize: false,
            embed_fn,
        }
    }

    /// L2-normalize the function's output before returning it
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }
}

impl<F> std::fmt::Debug for FnEmbeddingProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEmbeddingProvider")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .field("normalize", &self.normalize)
            .finish()
    }
}

#[async_trait]
impl<F> EmbeddingProvider for FnEmbeddingProvider<F>
where
    F: Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync,
{
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult {
                embeddings: vec![],
                dimension: self.dimension,
            });
        }

        let mut embeddings = (self.embed_fn)(texts);
        check_output(texts.len(), self.dimension, &embeddings)?;
        if self.normalize {
            embeddings.iter_mut().for_each(|e| l2_normalize(e));
        }

        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "function"
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn normalized(&self) -> bool {
        self.normalize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_counts(texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|t| {
                vec![
                    t.matches('a').count() as f32,
                    t.matches('b').count() as f32,
                ]
            })
            .collect()
    }

    #[test]
    fn test_embedding_result() {
        let result = EmbeddingResult::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_check_output() {
        assert!(check_output(2, 2, &[vec![1.0, 2.0], vec![3.0, 4.0]]).is_ok());
        assert!(matches!(
            check_output(3, 2, &[vec![1.0, 2.0]]),
            Err(EmbedError::InvalidOutput { .. })
        ));
        assert!(matches!(
            check_output(2, 2, &[vec![1.0, 2.0], vec![3.0]]),
            Err(EmbedError::InvalidOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_fn_provider_preserves_order() {
        let provider = FnEmbeddingProvider::new("letters", 2, letter_counts);
        let texts = vec!["aab".to_string(), "b".to_string(), "".to_string()];

        let result = provider.embed_texts(&texts).await.unwrap();
        assert_eq!(
            result.embeddings,
            vec![vec![2.0, 1.0], vec![0.0, 1.0], vec![0.0, 0.0]]
        );
        assert_eq!(result.dimension, 2);
        assert_eq!(provider.model_name(), "letters");
        assert_eq!(provider.provider_name(), "function");
        assert!(!provider.normalized());
    }

    #[tokio::test]
    async fn test_fn_provider_normalizes() {
        let provider =
            FnEmbeddingProvider::new("letters", 2, letter_counts).with_normalize(true);
        let v = provider.embed_text("aaabbbb").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(provider.normalized());
    }

    #[tokio::test]
    async fn test_fn_provider_rejects_wrong_width() {
        let provider = FnEmbeddingProvider::new("bad", 3, letter_counts);
        let err = provider.embed_text("ab").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn test_fn_provider_empty_batch() {
        let provider = FnEmbeddingProvider::new("letters", 2, |_: &[String]| -> Vec<Vec<f32>> {
            panic!("should not be called for an empty batch")
        });
        let result = provider.embed_texts(&[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.dimension, 2);
    }

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());

        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.model_name(), "all-minilm-l6-v2");
        assert_eq!(provider.embedding_dimension(), 0);
        assert!(provider.normalized());
    }

    #[tokio::test]
    async fn test_uninitialized_provider_errors() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());
        let err = provider
            .embed_texts(&["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_unknown_builtin_model() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = EmbedConfig::new(temp_dir.path(), "no-such-model");
        let err = FastEmbedProvider::create(config).await.unwrap_err();
        assert!(matches!(err, EmbedError::UnknownModel { .. }));
    }

    #[test]
    fn test_builtin_model_lookup() {
        assert!(builtin_model("all-minilm-l6-v2").is_some());
        assert!(builtin_model("BGE-Small-EN-v1.5").is_some());
        assert!(builtin_model("ModernBERT-large").is_none());
        assert!(builtin_model_names().contains(&"nomic-embed-text-v1.5"));
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = FastEmbedProvider::new(EmbedConfig::default())
            .create_cache_key()
            .unwrap();
        let key2 = FastEmbedProvider::new(EmbedConfig::default())
            .create_cache_key()
            .unwrap();
        assert_eq!(key1, key2, "Same config should produce same cache key");
        assert!(key1.starts_with("v1:"));

        let other_model = FastEmbedProvider::new(EmbedConfig::new("models", "bge-small-en-v1.5"))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, other_model);

        let other_dir = FastEmbedProvider::new(EmbedConfig::default_with_path("elsewhere"))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, other_dir);
    }

    #[tokio::test]
    #[ignore] // Downloads a real model - run with: cargo test test_builtin_model_embedding -- --ignored
    async fn test_builtin_model_embedding() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let temp_dir = tempfile::tempdir().unwrap();
        let provider = FastEmbedProvider::create(EmbedConfig::default_with_path(temp_dir.path())).await?;
        assert_eq!(provider.embedding_dimension(), 384);

        let texts = vec![
            "Tumor suppressor genes regulate cell division.".to_string(),
            "Oncogenes drive uncontrolled cell proliferation.".to_string(),
        ];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 2);
        for embedding in &result.embeddings {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3);
        }

        let again = provider.embed_texts(&texts).await?;
        assert_eq!(result, again, "embedding must be deterministic");
        Ok(())
    }
}
