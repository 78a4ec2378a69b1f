//! HuggingFace model downloading functionality

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Downloads models from HuggingFace Hub into the configured cache directory.
pub struct ModelDownloader {
    api: Api,
}

impl ModelDownloader {
    /// Create a downloader whose HuggingFace client caches under `config.hf_cache_dir()`.
    ///
    /// # Errors
    /// Returns [`EmbedError::ModelInitialization`] if the HuggingFace client cannot be built.
    ///
    /// # Example
    /// ```
    /// use paper_rag_embed::{EmbedConfig, ModelDownloader};
    ///
    /// let config = EmbedConfig::default_with_path("/tmp/models");
    /// let downloader = ModelDownloader::new(&config).unwrap();
    /// ```
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_cache_dir(config.hf_cache_dir())
            .build()
            .map_err(EmbedError::model_init)?;
        Ok(Self { api })
    }

    /// Download a model from HuggingFace Hub if not already present locally.
    ///
    /// Built-in models are fetched by FastEmbed itself, so this does nothing unless
    /// the configuration names a HuggingFace repository.
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors when creating directories or writing files
    /// - HuggingFace API errors (repository not found, authentication, etc.)
    pub async fn ensure_model(&self, config: &EmbedConfig) -> Result<()> {
        if !config.is_huggingface_model() {
            tracing::debug!("Not a HuggingFace model, skipping download");
            return Ok(());
        }

        if is_model_complete(config) {
            tracing::info!("Model {} already exists and is complete", config.model_name);
            return Ok(());
        }

        let repo_id = config
            .hf_repo()
            .ok_or_else(|| EmbedError::invalid_config("HuggingFace repository not specified"))?;

        tracing::info!(
            "Downloading model {} from {} ({})",
            config.model_name,
            repo_id,
            config.hf_revision()
        );

        fs::create_dir_all(config.model_path()).await?;

        let repo = self.api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            config.hf_revision().to_string(),
        ));

        self.download_model_files(&repo, config).await?;

        tracing::info!("Model {} downloaded successfully", config.model_name);
        Ok(())
    }

    async fn download_model_files(&self, repo: &ApiRepo, config: &EmbedConfig) -> Result<()> {
        for (remote_path, local_path) in model_files(config) {
            if local_path.exists() {
                tracing::debug!("File already exists: {}", local_path.display());
                continue;
            }
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            tracing::info!("Downloading {} to {}", remote_path, local_path.display());

            match repo.get(&remote_path).await {
                Ok(cached) => {
                    fs::copy(&cached, &local_path).await?;
                    tracing::debug!("Successfully downloaded {}", remote_path);
                }
                Err(e) if remote_path == "special_tokens_map.json" => {
                    tracing::warn!("Failed to download {}: {}", remote_path, e);
                    create_fallback_special_tokens_map(&local_path).await?;
                }
                Err(e) if remote_path == "tokenizer_config.json" => {
                    tracing::info!(
                        "tokenizer_config.json not available ({}), a minimal config will be generated",
                        e
                    );
                }
                Err(e) => return Err(EmbedError::model_init(e)),
            }
        }

        Ok(())
    }
}

/// Convenience wrapper: build a downloader for `config` and ensure its files exist.
pub async fn download_model(config: &EmbedConfig) -> Result<()> {
    ModelDownloader::new(config)?.ensure_model(config).await
}

/// Remote file names paired with where they live in the local model directory.
fn model_files(config: &EmbedConfig) -> Vec<(String, PathBuf)> {
    vec![
        (config.onnx_file.clone(), config.onnx_model_path()),
        ("tokenizer.json".to_string(), config.tokenizer_path()),
        ("config.json".to_string(), config.model_config_path()),
        (
            "special_tokens_map.json".to_string(),
            config.special_tokens_map_path(),
        ),
        (
            "tokenizer_config.json".to_string(),
            config.tokenizer_config_path(),
        ),
    ]
}

/// True once every required file is on disk. `tokenizer_config.json` is optional.
fn is_model_complete(config: &EmbedConfig) -> bool {
    let tokenizer_config = config.tokenizer_config_path();
    model_files(config)
        .into_iter()
        .filter(|(_, path)| *path != tokenizer_config)
        .all(|(_, path)| {
            let exists = path.exists();
            if !exists {
                tracing::debug!("Missing file: {}", path.display());
            }
            exists
        })
}

async fn create_fallback_special_tokens_map(path: &Path) -> Result<()> {
    let fallback_content = serde_json::json!({
        "cls_token": "[CLS]",
        "sep_token": "[SEP]",
        "unk_token": "[UNK]",
        "pad_token": "[PAD]",
        "mask_token": "[MASK]"
    });

    let content = serde_json::to_string_pretty(&fallback_content)
        .map_err(|e| EmbedError::External { source: e.into() })?;

    fs::write(path, content).await?;
    tracing::info!("Created fallback special_tokens_map.json");
    Ok(())
}
