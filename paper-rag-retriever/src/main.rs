use clap::{Args as ClapArgs, Parser, Subcommand};
use paper_rag_context::{ChunkingConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, SectionTitleRule};
use paper_rag_embed::{DEFAULT_MODEL_NAME, EmbedConfig, FastEmbedProvider};
use paper_rag_retriever::{
    IndexStore, IndexingEngineConfig, RetrievalResult, SqliteIndexStore, build_index,
    build_prompt, format_context, load_papers, retrieve,
};
use std::path::PathBuf;
use std::process;
use tracing::info;

/// A CLI tool to build and query a retrieval index over research papers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory containing the .paper-rag.db database file
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk and embed every paper in a directory, replacing the stored index
    Build {
        /// Directory holding PMC*.txt papers and their *_metadata.json files
        #[arg(short, long, default_value = "papers")]
        papers_dir: PathBuf,
        /// Number of words per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Number of words shared by consecutive chunks of a section
        #[arg(long, default_value_t = DEFAULT_OVERLAP)]
        overlap: usize,
        /// How section titles are derived (first-non-empty-line, uppercase-heading, none)
        #[arg(long, default_value = "first-non-empty-line")]
        title_rule: SectionTitleRule,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Retrieve the chunks nearest to a question
    Query {
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// Print the full prompt for a generator instead of the results
        #[arg(long)]
        prompt: bool,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List stored chunks
    List {
        /// Limit number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

/// Embedding model selection, shared by `build` and `query`
#[derive(ClapArgs, Debug)]
struct ModelArgs {
    /// Built-in model name, or the local name of a HuggingFace model
    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    model: String,
    /// HuggingFace repository to download an ONNX model from
    #[arg(long)]
    hf_repo: Option<String>,
    /// Revision of the HuggingFace repository
    #[arg(long, default_value = "main")]
    hf_revision: String,
    /// Directory models are downloaded to
    #[arg(long, default_value = "models")]
    cache_dir: PathBuf,
    /// Number of texts embedded per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Keep raw embeddings instead of L2-normalising them
    #[arg(long)]
    no_normalize: bool,
}

impl ModelArgs {
    fn embed_config(&self) -> anyhow::Result<EmbedConfig> {
        let mut config = match &self.hf_repo {
            Some(repo) => EmbedConfig::from_huggingface(&self.cache_dir, &self.model, repo)
                .with_revision(&self.hf_revision),
            None => EmbedConfig::new(&self.cache_dir, &self.model),
        };
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        config = config.with_normalize(!self.no_normalize);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Build {
            papers_dir,
            chunk_size,
            overlap,
            title_rule,
            model,
        } => {
            // Reject bad settings before loading papers or a model
            let chunking = ChunkingConfig::new(chunk_size, overlap)?.with_title_rule(title_rule);
            let embed_config = model.embed_config()?;
            let mut engine_config = IndexingEngineConfig::new(chunking);
            if let Some(batch_size) = model.batch_size {
                engine_config = engine_config.with_batch_size(batch_size);
            }
            engine_config.validate()?;

            let papers = load_papers(&papers_dir).await?;
            let provider = FastEmbedProvider::create(embed_config).await?;
            let index = build_index(&papers, &provider, &engine_config).await?;

            let store = SqliteIndexStore::open(&args.base_dir).await?;
            store.save(&index).await?;

            let stats = index.stats();
            info!("Index written to {}", store.location().display());
            println!(
                "Indexed {} chunks from {} papers ({} dimensions)",
                stats.chunk_count, stats.document_count, stats.dimension
            );
            Ok(())
        }
        Commands::Query {
            question,
            k,
            prompt,
            format,
            model,
        } => {
            if k == 0 {
                anyhow::bail!("-k must be at least 1");
            }
            let embed_config = model.embed_config()?;
            let store = SqliteIndexStore::open_existing(&args.base_dir).await?;
            let provider = FastEmbedProvider::create(embed_config).await?;
            let index = store.load_for(&provider).await?;

            let results = retrieve(&question, &provider, &index, k).await?;

            if prompt {
                println!("{}", build_prompt(&question, &results));
                return Ok(());
            }
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Full => print!("{}", format_context(&results)),
                OutputFormat::Summary => print_summary(&results),
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let store = SqliteIndexStore::open_existing(&args.base_dir).await?;
            let index = store.load().await?;
            let stats = index.stats();

            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "stats": stats,
                        "index": index.info(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    let info = index.info();
                    println!("Index Statistics:");
                    println!("  Papers: {}", stats.document_count);
                    println!("  Sections: {}", stats.section_count);
                    println!("  Chunks: {}", stats.chunk_count);
                    println!("  Average words per chunk: {:.1}", stats.average_words_per_chunk);
                    println!("  Embedding model: {}", info.embedding.model_id());
                    println!(
                        "  Chunking: {} words, {} overlap, {} titles",
                        info.chunking.chunk_size, info.chunking.overlap, info.chunking.title_rule
                    );
                    println!(
                        "  Built: {} (version {})",
                        info.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        info.builder_version
                    );
                }
            }
            Ok(())
        }
        Commands::List { limit, format } => {
            let store = SqliteIndexStore::open_existing(&args.base_dir).await?;
            let chunks = store.list_chunks(limit).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&chunks)?),
                OutputFormat::Summary => {
                    println!("Found {} chunks:", chunks.len());
                    for chunk in chunks {
                        let md = &chunk.metadata;
                        println!(
                            "  #{} | {} | Section {} ({}) | Chunk {} | {} words",
                            chunk.position,
                            md.source_document_id,
                            md.section_index,
                            truncate(&md.section_title, 40),
                            md.chunk_index_in_section,
                            chunk.text.split_whitespace().count()
                        );
                    }
                }
                OutputFormat::Full => {
                    for chunk in chunks {
                        let md = &chunk.metadata;
                        println!("Position: {}", chunk.position);
                        println!("Paper: {} (PMID {}, DOI {})", md.source_document_id, md.pmid, md.doi);
                        println!("Journal: {} ({})", md.journal, md.year);
                        println!("Authors: {}", md.authors);
                        println!("{}", md.passage(&chunk.text));
                        println!("{}", "-".repeat(80));
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_summary(results: &[RetrievalResult]) {
    println!("Found {} chunks:", results.len());
    for result in results {
        let md = &result.metadata;
        println!(
            "  {}. {} | {} | distance {:.4}",
            result.rank + 1,
            md.source_document_id,
            truncate(&md.section_title, 40),
            result.distance
        );
        println!("     {}", truncate(&result.text, 100));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
