//! Prompt construction.
//!
//! A prompt is a pure function of the instruction, the retrieved context,
//! and the query text. The layout is:
//!
//! ```text
//! <instruction>
//!
//! Context:
//! [1] (id: <doc id>)
//! <doc text, truncated to max_context_chars>
//!
//! [2] (id: <doc id>)
//! <doc text>
//!
//! Question: <query>
//! ```
//!
//! When retrieval returns nothing, the `Context:` block is omitted and the
//! prompt is the instruction followed by the question.

use crate::models::ScoredDocument;

/// Default system instruction placed at the top of every prompt.
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant. Answer the question using only \
the numbered context passages below. If the context does not contain the answer, say that you \
do not know.";

/// Builds prompts from retrieved context.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
    max_context_chars: usize,
}

impl PromptBuilder {
    pub fn new(instruction: impl Into<String>, max_context_chars: usize) -> Self {
        Self {
            instruction: instruction.into(),
            max_context_chars,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Assemble the prompt for `query` over `context`, in the order given.
    pub fn build(&self, query: &str, context: &[ScoredDocument]) -> String {
        let mut prompt = String::with_capacity(
            self.instruction.len()
                + query.len()
                + context.len() * (self.max_context_chars + 32)
                + 32,
        );

        prompt.push_str(self.instruction.trim_end());
        prompt.push_str("\n\n");

        if !context.is_empty() {
            prompt.push_str("Context:\n");
            for (i, doc) in context.iter().enumerate() {
                prompt.push_str(&format!("[{}] (id: {})\n", i + 1, doc.id));
                prompt.push_str(truncate_chars(&doc.text, self.max_context_chars));
                prompt.push_str("\n\n");
            }
        }

        prompt.push_str("Question: ");
        prompt.push_str(query.trim());
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION, 2000)
    }
}

/// Return the prefix of `text` holding at most `max_chars` characters.
///
/// Cuts on a `char` boundary, so multi-byte text is never split mid-codepoint.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
