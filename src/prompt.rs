//! Context-prompt assembly.
//!
//! Formats retrieved passages plus an instruction template into the single
//! prompt string sent to the completion endpoint. Pure and deterministic;
//! no network or storage access.

/// Instruction used when the caller supplies none: grounded answering
/// with fallback to general knowledge.
pub const DEFAULT_INSTRUCTION: &str = "Use the following excerpts to answer the user question. \
If the answer is not contained here, use your personal knowledge.";

/// Separator between passages.
const PASSAGE_DELIMITER: &str = "\n\n---\n\n";

/// Build the grounded prompt for a question.
///
/// Passages appear under numbered `Context N:` labels in the order given
/// (relevance order from retrieval, not chunk ordinal), followed by the
/// literal question and a concise-answer directive.
pub fn build_prompt(question: &str, passages: &[String], instruction: Option<&str>) -> String {
    let instruction = instruction.unwrap_or(DEFAULT_INSTRUCTION);

    let context = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("Context {}:\n{}", i + 1, passage))
        .collect::<Vec<_>>()
        .join(PASSAGE_DELIMITER);

    format!(
        "{}\n\n{}\n\nQuestion: {}\nAnswer concisely:",
        instruction, context, question
    )
}
