//! End-to-end example demonstrating the complete retrieval workflow
//!
//! This example shows how to:
//! 1. Write a small directory of papers with metadata
//! 2. Chunk and embed them into an index
//! 3. Save the index to SQLite and load it back
//! 4. Retrieve chunks for a question and build a grounded prompt
//!
//! Note: a bag-of-letters function stands in for the embedding model so the
//! example runs offline. Swap in `FastEmbedProvider` for semantic search.

use anyhow::Result;
use paper_rag_embed::FnEmbeddingProvider;
use paper_rag_retriever::{
    IndexStore, IndexingEngineConfig, SqliteIndexStore, build_index, build_prompt, load_papers,
    retrieve,
};
use std::path::Path;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("🚀 Starting end-to-end retrieval example...\n");

    let temp_dir = tempdir()?;
    let papers_dir = temp_dir.path().join("papers");
    create_test_papers(&papers_dir).await?;
    println!("📝 Wrote test papers to {}", papers_dir.display());

    let provider = FnEmbeddingProvider::new("letters", 26, |texts: &[String]| {
        texts
            .iter()
            .map(|t| {
                let mut counts = vec![0.0f32; 26];
                for c in t.to_lowercase().chars().filter(char::is_ascii_lowercase) {
                    counts[(c as u8 - b'a') as usize] += 1.0;
                }
                counts
            })
            .collect()
    })
    .with_normalize(true);

    let papers = load_papers(&papers_dir).await?;
    let index = build_index(&papers, &provider, &IndexingEngineConfig::default()).await?;
    let stats = index.stats();
    println!(
        "✅ Indexed {} chunks from {} papers ({} sections)",
        stats.chunk_count, stats.document_count, stats.section_count
    );

    let store = SqliteIndexStore::open(temp_dir.path()).await?;
    store.save(&index).await?;
    let index = store.load_for(&provider).await?;
    println!("💾 Saved and reloaded index from {}\n", store.location().display());

    let question = "Which cells clear amyloid plaques?";
    let results = retrieve(question, &provider, &index, 2).await?;

    println!("🔍 Top results for: {question}");
    for result in &results {
        println!(
            "  {}. {} / {} (distance {:.3})",
            result.rank + 1,
            result.metadata.source_document_id,
            result.metadata.section_title,
            result.distance
        );
    }

    println!("\n📋 Prompt:\n{}", build_prompt(question, &results));
    Ok(())
}

async fn create_test_papers(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let papers = [
        (
            "PMC1001",
            "TITLE: Microglial clearance of amyloid\n\n\
             ABSTRACT\nMicroglia surround amyloid plaques and clear them by phagocytosis.\n\n\
             RESULTS\nPlaque burden fell after microglial activation in aged mice.",
            Some(r#"{"pmc_id": "1001", "journal": "Glia", "year": "2023", "authors": ["R Okafor"]}"#),
        ),
        (
            "PMC1002",
            "TITLE: Tau propagation along circuits\n\n\
             ABSTRACT\nTau aggregates spread trans-synaptically between connected neurons.",
            None,
        ),
    ];

    for (id, text, metadata) in papers {
        tokio::fs::write(dir.join(format!("{id}.txt")), text).await?;
        if let Some(metadata) = metadata {
            tokio::fs::write(dir.join(format!("{id}_metadata.json")), metadata).await?;
        }
    }
    Ok(())
}
