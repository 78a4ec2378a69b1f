//! Embed a few paper passages with a built-in model and compare them.

use paper_rag_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cache_dir = tempfile::tempdir()?;
    let config = EmbedConfig::default_with_path(cache_dir.path())
        .with_batch_size(2)
        .with_normalize(true);

    println!("Model: {} (cache: {})", config.model_name, config.cache_dir.display());
    let provider = FastEmbedProvider::create(config).await?;
    println!(
        "Provider {} ready, dimension {}",
        provider.provider_name(),
        provider.embedding_dimension()
    );

    let passages = vec![
        "(PMCID=PMC001, Section=Abstract)\nBRCA1 loss impairs homologous recombination repair.".to_string(),
        "(PMCID=PMC002, Section=Results)\nPARP inhibitors are lethal to HR-deficient tumor cells.".to_string(),
        "(PMCID=PMC003, Section=Methods)\nMice were housed under a 12 hour light cycle.".to_string(),
    ];
    let result = provider.embed_texts(&passages).await?;

    let query = provider
        .embed_text("Which DNA repair defects sensitize cancers to PARP inhibition?")
        .await?;

    for (passage, embedding) in passages.iter().zip(&result.embeddings) {
        let header = passage.lines().next().unwrap_or_default();
        println!("{:.3}  {}", dot(&query, embedding), header);
    }

    Ok(())
}
