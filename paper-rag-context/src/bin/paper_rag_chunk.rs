use clap::Parser;
use paper_rag_context::text::{ChunkingConfig, SectionChunker, SectionTitleRule};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to chunk a paper's plain text into JSON output using paper-rag-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Document identifier used in the passage headers.
    #[arg(short, long, default_value = "unknown")]
    document_id: String,

    /// Number of words per chunk.
    #[arg(short, long, default_value_t = 500)]
    chunk_size: usize,

    /// Number of words shared by consecutive chunks of a section.
    #[arg(short, long, default_value_t = 50)]
    overlap: usize,

    /// How section titles are derived (first-non-empty-line, uppercase-heading, none).
    #[arg(short, long, default_value = "first-non-empty-line")]
    title_rule: SectionTitleRule,
}

#[derive(Serialize)]
struct SerializableChunk<'a> {
    section_index: usize,
    section_title: &'a str,
    chunk_index_in_section: usize,
    word_count: usize,
    chunk_text: &'a str,
    passage: String,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Reject a bad window before reading any input
    let config =
        ChunkingConfig::new(args.chunk_size, args.overlap)?.with_title_rule(args.title_rule);
    let chunker = SectionChunker::new(config)?;

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let chunks = chunker.get_chunks(&file_content);

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .map(|c| SerializableChunk {
            section_index: c.section_index,
            section_title: &c.section_title,
            chunk_index_in_section: c.chunk_index_in_section,
            word_count: c.word_count(),
            chunk_text: &c.chunk_text,
            passage: c.build(&args.document_id),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&serializable_chunks)?);

    Ok(())
}
