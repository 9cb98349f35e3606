//! Text-generation collaborator trait.
//!
//! Concrete generators (OpenAI chat completions, Ollama chat) live in the
//! `rag-harness` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Pass-through generation settings.
///
/// The pipeline never interprets these; they are handed to the
/// [`Generator`] as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

/// Trait for text-generation collaborators.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}
