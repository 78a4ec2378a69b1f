//! Render retrieved chunks as grounding context for a generator.

use super::retriever::RetrievalResult;

/// Separator between two context blocks
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Opening instruction of [`build_prompt`]
pub const PROMPT_PREAMBLE: &str =
    "Use the provided excerpts from Alzheimer's research to answer the question that follows.";

/// Each result as a citation header plus its text, nearest first.
///
/// A trailing `---` line closes the context, even when there are no results.
pub fn format_context(results: &[RetrievalResult]) -> String {
    let mut context = results
        .iter()
        .map(RetrievalResult::passage)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR);
    context.push_str("---\n");
    context
}

/// A complete prompt asking `question` against the retrieved context.
pub fn build_prompt(question: &str, results: &[RetrievalResult]) -> String {
    format!(
        "{PROMPT_PREAMBLE}\n\nContext:\n{}\n\nQuestion: {question}",
        format_context(results)
    )
}
