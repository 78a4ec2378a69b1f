//! This module turns the plain text of a research paper into retrieval passages
//! for a RAG (Retrieval Augmented Generation) system.
//!
//! A paper arrives as one string in which blank lines (`"\n\n"`) separate its
//! blocks: the title/abstract block, then one block per body section. Each block
//! becomes a [`Section`], and each section is cut into overlapping word windows
//! that become [`SectionChunk`]s. Chunks never span two sections.
//!
//! The module defines:
//! - [`ChunkingConfig`]: window width, overlap and the [`SectionTitleRule`].
//! - [`SectionChunker`]: a validated chunker built from a config.
//! - [`chunk`]: a one-shot helper taking the raw parameters.
//!
//! # Sectioning
//!
//! Section indices are positions in the raw `"\n\n"` split. A block with no
//! non-empty lines produces no chunks, and its index is skipped rather than
//! reused, so the indices of a paper's chunks may have gaps.
//!
//! # Windowing
//!
//! A section of at most `chunk_size` words is one chunk. A longer section of `W`
//! words is cut into windows of `chunk_size` words starting every
//! `chunk_size - overlap` words, stopping at the first window that reaches the
//! last word. That yields `ceil((W - chunk_size) / (chunk_size - overlap)) + 1`
//! chunks, the last of which may be short.
//!
//! # Usage
//!
//! ```
//! use paper_rag_context::text::{ChunkingConfig, SectionChunker};
//!
//! let body: Vec<String> = (1..=520).map(|i| format!("word{i}")).collect();
//! let paper = format!("TITLE: X\n\nMETHODS\n{}", body.join(" "));
//!
//! let chunker = SectionChunker::new(ChunkingConfig::new(500, 50)?)?;
//! let chunks = chunker.get_chunks(&paper);
//!
//! // One chunk for the title block, two for METHODS (521 words with its heading).
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[0].section_title, "TITLE: X");
//! assert_eq!(chunks[1].section_title, "METHODS");
//! assert_eq!(chunks[1].chunk_index_in_section, 0);
//! assert_eq!(chunks[2].chunk_index_in_section, 1);
//! # Ok::<(), paper_rag_context::ChunkError>(())
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of words shared by consecutive chunks of a section.
pub const DEFAULT_OVERLAP: usize = 50;

/// Separator between sections in the raw paper text.
pub const SECTION_SEPARATOR: &str = "\n\n";

/// Result type for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Errors raised when a chunking configuration cannot make progress.
///
/// These are always raised before any text is looked at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// A window must hold at least one word
    #[error("Invalid chunking configuration: chunk_size must be at least 1")]
    ZeroChunkSize,

    /// The window step `chunk_size - overlap` must be at least one word
    #[error(
        "Invalid chunking configuration: overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
    )]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// How a section's title is derived from its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionTitleRule {
    /// The first non-empty, trimmed line, used verbatim. For sections without a
    /// heading this is ordinary body text.
    #[default]
    FirstNonEmptyLine,

    /// The first non-empty line, but only if all of its letters are uppercase
    /// (body headings are written as `METHODS`, `RESULTS`, ...). Otherwise empty.
    UppercaseHeading,

    /// Sections are left untitled.
    None,
}

impl SectionTitleRule {
    /// Pick the title from a section's non-empty, trimmed lines.
    pub fn title_for(&self, lines: &[&str]) -> String {
        let Some(first) = lines.first() else {
            return String::new();
        };
        match self {
            SectionTitleRule::FirstNonEmptyLine => first.to_string(),
            SectionTitleRule::UppercaseHeading => {
                let mut letters = first.chars().filter(|c| c.is_alphabetic()).peekable();
                if letters.peek().is_some() && letters.all(|c| c.is_uppercase()) {
                    first.to_string()
                } else {
                    String::new()
                }
            }
            SectionTitleRule::None => String::new(),
        }
    }
}

impl fmt::Display for SectionTitleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionTitleRule::FirstNonEmptyLine => write!(f, "first-non-empty-line"),
            SectionTitleRule::UppercaseHeading => write!(f, "uppercase-heading"),
            SectionTitleRule::None => write!(f, "none"),
        }
    }
}

impl FromStr for SectionTitleRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-non-empty-line" | "first_non_empty_line" | "first-line" | "first" => {
                Ok(SectionTitleRule::FirstNonEmptyLine)
            }
            "uppercase-heading" | "uppercase_heading" | "uppercase" => {
                Ok(SectionTitleRule::UppercaseHeading)
            }
            "none" => Ok(SectionTitleRule::None),
            _ => Err(format!(
                "Invalid section title rule: '{s}'. Valid values are: first-non-empty-line, uppercase-heading, none"
            )),
        }
    }
}

/// Configuration for cutting sections into word windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum number of words in a chunk
    pub chunk_size: usize,
    /// Number of words consecutive chunks of a section share
    pub overlap: usize,
    /// How section titles are derived
    #[serde(default)]
    pub title_rule: SectionTitleRule,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            title_rule: SectionTitleRule::default(),
        }
    }
}

impl ChunkingConfig {
    /// Create a validated configuration using the default title rule.
    ///
    /// # Errors
    /// [`ChunkError::ZeroChunkSize`] if `chunk_size` is 0, and
    /// [`ChunkError::OverlapTooLarge`] if `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
            title_rule: SectionTitleRule::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_title_rule(mut self, title_rule: SectionTitleRule) -> Self {
        self.title_rule = title_rule;
        self
    }

    /// Check that windowing will terminate.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance in words between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// One blank-line-delimited block of a paper that has at least one non-empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// Position of the block in the raw split, counting skipped blocks
    pub index: usize,
    /// Title picked by the [`SectionTitleRule`]
    pub title: String,
    /// The block's raw text
    pub text: &'a str,
}

impl Section<'_> {
    /// Whitespace-delimited words of the section, including its title line.
    pub fn words(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

/// Split a paper into its non-empty sections.
///
/// ```
/// use paper_rag_context::text::{SectionTitleRule, split_sections};
///
/// let sections = split_sections("Intro line\nmore\n\n \n\nRESULTS\nnone", SectionTitleRule::default());
/// assert_eq!(sections.len(), 2);
/// assert_eq!(sections[0].index, 0);
/// assert_eq!(sections[1].index, 2); // the whitespace-only block keeps index 1
/// assert_eq!(sections[1].title, "RESULTS");
/// ```
pub fn split_sections(text: &str, title_rule: SectionTitleRule) -> Vec<Section<'_>> {
    text.split(SECTION_SEPARATOR)
        .enumerate()
        .filter_map(|(index, block)| {
            let lines: Vec<&str> = block
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();
            if lines.is_empty() {
                return None;
            }
            Some(Section {
                index,
                title: title_rule.title_for(&lines),
                text: block,
            })
        })
        .collect()
}

/// A word window of one section, with its position in the paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionChunk {
    /// Index of the owning section in the raw split
    pub section_index: usize,
    /// Title of the owning section
    pub section_title: String,
    /// Position of this chunk within its section (0-indexed, gapless)
    pub chunk_index_in_section: usize,
    /// The window's words joined by single spaces
    pub chunk_text: String,
}

impl SectionChunk {
    /// Number of words in the chunk.
    pub fn word_count(&self) -> usize {
        self.chunk_text.split_whitespace().count()
    }

    /// Format the chunk as a citable passage for a grounding prompt.
    ///
    /// ```
    /// use paper_rag_context::text::SectionChunk;
    ///
    /// let chunk = SectionChunk {
    ///     section_index: 3,
    ///     section_title: "RESULTS".to_string(),
    ///     chunk_index_in_section: 0,
    ///     chunk_text: "Plasma p-tau217 was elevated.".to_string(),
    /// };
    /// assert_eq!(
    ///     chunk.build("PMC123"),
    ///     "(PMCID=PMC123, Section=RESULTS)\nPlasma p-tau217 was elevated."
    /// );
    /// ```
    pub fn build(&self, document_id: &str) -> String {
        passage(document_id, &self.section_title, &self.chunk_text)
    }
}

/// Render chunk text under its citation header.
pub fn passage(document_id: &str, section_title: &str, chunk_text: &str) -> String {
    format!("(PMCID={document_id}, Section={section_title})\n{chunk_text}")
}

/// Cuts paper text into [`SectionChunk`]s with a validated [`ChunkingConfig`].
#[derive(Debug, Clone)]
pub struct SectionChunker {
    config: ChunkingConfig,
}

impl SectionChunker {
    /// Creates a chunker. The configuration is validated up front, so a
    /// `SectionChunker` never windows with a zero step.
    ///
    /// # Errors
    /// The [`ChunkError`] from [`ChunkingConfig::validate`].
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `text` into sections and cut every section into word windows.
    ///
    /// Chunks are returned in paper order: by section, then by position in the
    /// section. Empty text yields no chunks.
    pub fn get_chunks(&self, text: &str) -> Vec<SectionChunk> {
        let mut chunks = Vec::new();
        for section in split_sections(text, self.config.title_rule) {
            let words = section.words();
            for (chunk_index_in_section, chunk_text) in
                window_words(&words, self.config.chunk_size, self.config.step())
                    .into_iter()
                    .enumerate()
            {
                chunks.push(SectionChunk {
                    section_index: section.index,
                    section_title: section.title.clone(),
                    chunk_index_in_section,
                    chunk_text,
                });
            }
        }
        chunks
    }
}

/// Chunk a paper with explicit parameters.
///
/// The configuration is checked before the text is touched:
///
/// ```
/// use paper_rag_context::text::{ChunkError, SectionTitleRule, chunk};
///
/// let err = chunk("any text", SectionTitleRule::default(), 100, 100).unwrap_err();
/// assert_eq!(err, ChunkError::OverlapTooLarge { chunk_size: 100, overlap: 100 });
/// ```
pub fn chunk(
    text: &str,
    title_rule: SectionTitleRule,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<SectionChunk>> {
    let config = ChunkingConfig::new(chunk_size, overlap)?.with_title_rule(title_rule);
    Ok(SectionChunker::new(config)?.get_chunks(text))
}

// Windows of `chunk_size` words every `step` words; the final window ends at the
// last word. Callers guarantee `chunk_size >= 1` and `step >= 1`.
fn window_words(words: &[&str], chunk_size: usize, step: usize) -> Vec<String> {
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= chunk_size {
        return vec![words.join(" ")];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("word{i}")).collect()
    }

    fn expected_chunk_count(words: usize, chunk_size: usize, overlap: usize) -> usize {
        if words <= chunk_size {
            1
        } else {
            (words - chunk_size).div_ceil(chunk_size - overlap) + 1
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let words = numbered_words(520);
        let text = format!("TITLE: X\n\nMETHODS\n{}", words.join(" "));

        let chunks = chunk(&text, SectionTitleRule::FirstNonEmptyLine, 500, 50).unwrap();

        let sections: std::collections::BTreeSet<usize> =
            chunks.iter().map(|c| c.section_index).collect();
        assert_eq!(sections.len(), 2);

        let methods: Vec<&SectionChunk> =
            chunks.iter().filter(|c| c.section_index == 1).collect();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].section_title, "METHODS");

        // The section's words are the heading followed by word1..word520.
        let mut section_words = vec!["METHODS".to_string()];
        section_words.extend(words);
        assert_eq!(methods[0].chunk_text, section_words[0..500].join(" "));
        assert_eq!(methods[1].chunk_text, section_words[450..521].join(" "));
        assert_eq!(methods[1].word_count(), 71);
    }

    #[test]
    fn test_section_body_without_heading_matches_window_bounds() {
        // A 520-word section: chunk 0 = words[0:500], chunk 1 = words[450:520].
        let words = numbered_words(520);
        let text = format!("TITLE: X\n\n{}", words.join(" "));

        let chunks = chunk(&text, SectionTitleRule::FirstNonEmptyLine, 500, 50).unwrap();
        let body: Vec<&SectionChunk> = chunks.iter().filter(|c| c.section_index == 1).collect();

        assert_eq!(body.len(), 2);
        assert_eq!(body[0].chunk_text, words[0..500].join(" "));
        assert_eq!(body[1].chunk_text, words[450..520].join(" "));
        assert_eq!(body[1].word_count(), 70);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = SectionChunker::new(ChunkingConfig::default()).unwrap();
        assert!(chunker.get_chunks("").is_empty());
        assert!(chunker.get_chunks("\n\n\n\n   \n").is_empty());
    }

    #[test]
    fn test_exact_chunk_size_is_single_chunk() {
        let words = numbered_words(100);
        let text = words.join(" ");
        let chunks = chunk(&text, SectionTitleRule::default(), 100, 10).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_text, text);
        assert_eq!(chunks[0].chunk_index_in_section, 0);
    }

    #[test]
    fn test_short_section_is_whole_text_with_single_spaces() {
        let chunks = chunk(
            "Line one\n   indented   words\tand tabs",
            SectionTitleRule::default(),
            50,
            5,
        )
        .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_text, "Line one indented words and tabs");
        assert_eq!(chunks[0].section_title, "Line one");
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        assert_eq!(
            chunk("text", SectionTitleRule::default(), 100, 100),
            Err(ChunkError::OverlapTooLarge {
                chunk_size: 100,
                overlap: 100
            })
        );
        assert_eq!(
            chunk("text", SectionTitleRule::default(), 10, 20),
            Err(ChunkError::OverlapTooLarge {
                chunk_size: 10,
                overlap: 20
            })
        );
        assert_eq!(
            chunk("", SectionTitleRule::default(), 0, 0),
            Err(ChunkError::ZeroChunkSize)
        );
        assert!(SectionChunker::new(ChunkingConfig {
            chunk_size: 5,
            overlap: 5,
            title_rule: SectionTitleRule::default(),
        })
        .is_err());
    }

    #[test]
    fn test_chunk_count_formula() {
        let cases = [
            (501, 500, 50),
            (950, 500, 50),
            (951, 500, 50),
            (1000, 500, 50),
            (12, 10, 8),
            (37, 5, 0),
            (40, 5, 0),
            (100, 7, 3),
            (3, 1, 0),
        ];
        for (word_count, chunk_size, overlap) in cases {
            let text = numbered_words(word_count).join(" ");
            let chunks = chunk(&text, SectionTitleRule::default(), chunk_size, overlap).unwrap();
            assert_eq!(
                chunks.len(),
                expected_chunk_count(word_count, chunk_size, overlap),
                "W={word_count}, chunk_size={chunk_size}, overlap={overlap}"
            );
        }
    }

    #[test]
    fn test_chunk_indices_are_gapless_per_section() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            numbered_words(23).join(" "),
            numbered_words(4).join(" "),
            numbered_words(61).join(" ")
        );
        let chunks = chunk(&text, SectionTitleRule::default(), 10, 3).unwrap();

        for section_index in 0..3 {
            let indices: Vec<usize> = chunks
                .iter()
                .filter(|c| c.section_index == section_index)
                .map(|c| c.chunk_index_in_section)
                .collect();
            let expected: Vec<usize> = (0..indices.len()).collect();
            assert!(!indices.is_empty());
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn test_windows_overlap_and_reconstruct_section() {
        let words = numbered_words(87);
        let text = words.join(" ");
        let (chunk_size, overlap) = (20, 6);
        let chunks = chunk(&text, SectionTitleRule::default(), chunk_size, overlap).unwrap();

        // Consecutive windows share exactly `overlap` words.
        for pair in chunks.windows(2) {
            let previous: Vec<&str> = pair[0].chunk_text.split(' ').collect();
            let next: Vec<&str> = pair[1].chunk_text.split(' ').collect();
            assert_eq!(previous[previous.len() - overlap..], next[..overlap]);
        }

        // Dropping the overlapping prefixes gives back the section's words in order.
        let mut rebuilt: Vec<String> = Vec::new();
        for (i, c) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            rebuilt.extend(c.chunk_text.split(' ').skip(skip).map(str::to_string));
        }
        assert_eq!(rebuilt, words);
    }

    #[test]
    fn test_skipped_sections_keep_their_index_slot() {
        let text = "Abstract text here\n\n\n\n   \n\nRESULTS\nfinding one\n\n\nDISCUSSION\nmore";
        let chunks = chunk(text, SectionTitleRule::default(), 50, 5).unwrap();

        let indices: Vec<usize> = chunks.iter().map(|c| c.section_index).collect();
        // Raw split: ["Abstract text here", "", "   ", "RESULTS\nfinding one", "\nDISCUSSION\nmore"]
        assert_eq!(indices, vec![0, 3, 4]);
        assert_eq!(chunks[1].section_title, "RESULTS");
        assert_eq!(chunks[2].section_title, "DISCUSSION");
    }

    #[test]
    fn test_title_rules() {
        let text = "TITLE: Gut microbiome\nABSTRACT: ...\n\nMETHODS\nWe sampled\n\nno heading here";

        let first = chunk(text, SectionTitleRule::FirstNonEmptyLine, 50, 5).unwrap();
        let titles: Vec<&str> = first.iter().map(|c| c.section_title.as_str()).collect();
        assert_eq!(titles, vec!["TITLE: Gut microbiome", "METHODS", "no heading here"]);

        let upper = chunk(text, SectionTitleRule::UppercaseHeading, 50, 5).unwrap();
        let titles: Vec<&str> = upper.iter().map(|c| c.section_title.as_str()).collect();
        assert_eq!(titles, vec!["", "METHODS", ""]);

        let none = chunk(text, SectionTitleRule::None, 50, 5).unwrap();
        assert!(none.iter().all(|c| c.section_title.is_empty()));
    }

    #[test]
    fn test_title_rule_from_str() {
        assert_eq!(
            "first-non-empty-line".parse::<SectionTitleRule>().unwrap(),
            SectionTitleRule::FirstNonEmptyLine
        );
        assert_eq!(
            "Uppercase".parse::<SectionTitleRule>().unwrap(),
            SectionTitleRule::UppercaseHeading
        );
        assert_eq!(
            "none".parse::<SectionTitleRule>().unwrap(),
            SectionTitleRule::None
        );
        assert!("heading".parse::<SectionTitleRule>().is_err());
        assert_eq!(
            SectionTitleRule::UppercaseHeading.to_string(),
            "uppercase-heading"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.overlap, 50);
        assert_eq!(config.step(), 450);
        assert!(config.validate().is_ok());
    }
}
