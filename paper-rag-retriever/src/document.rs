//! Papers as they come out of the acquisition step.
//!
//! The acquisition step leaves one `PMC<id>.txt` file per article in a
//! directory, with blank lines between sections, next to an optional
//! `PMC<id>_metadata.json` holding bibliographic fields:
//!
//! ```text
//! papers/
//!   PMC11350031.txt
//!   PMC11350031_metadata.json   {"pmc_id": "11350031", "pmid": "391...", "journal": "...", ...}
//! ```
//!
//! [`load_papers`] turns such a directory into [`Document`]s in file-name order,
//! which fixes the global chunk ordering of an index built from it.

use crate::error::Result;
use crate::retrieval::chunking_strategy::ChunkingStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Placeholder stored for bibliographic fields a paper does not provide.
pub const UNKNOWN: &str = "unknown";

/// Bibliographic record written by the acquisition step. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default)]
    pub pmc_id: Option<String>,
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

/// A paper's full text plus its identifier. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier, the PMC accession (e.g. `PMC11350031`)
    pub id: String,
    pub text: String,
    pub metadata: Option<PaperMetadata>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PaperMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Read every paper in `dir`, sorted by file name.
///
/// Files that are not `PMC*.txt` are ignored. A paper whose metadata file is
/// missing or unreadable is still returned, with `metadata: None`.
pub async fn load_papers(dir: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && ChunkingStrategy::should_index_file(&path) {
            paths.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            warn!("Skipping paper with a non UTF-8 name: {}", path.display());
            continue;
        };
        let text = fs::read_to_string(&path).await?;
        let metadata = load_metadata(dir, &id).await;
        documents.push(Document { id, text, metadata });
    }

    info!("Loaded {} papers from {}", documents.len(), dir.display());
    Ok(documents)
}

/// Path of the metadata file that accompanies paper `id`.
pub fn metadata_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}_metadata.json"))
}

async fn load_metadata(dir: &Path, id: &str) -> Option<PaperMetadata> {
    let path = metadata_path(dir, id);
    let raw = match fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("No metadata for {} ({}): {}", id, path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!("Malformed metadata for {} ({}): {}", id, path.display(), e);
            None
        }
    }
}
