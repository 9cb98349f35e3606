//! Retrieval-augmented answering.
//!
//! [`RagPipeline`] orchestrates the three collaborators:
//!
//! ```text
//! query ──▶ Embedder ──▶ VectorStore.search(k) ──▶ PromptBuilder ──▶ Generator ──▶ Answer
//! ```
//!
//! Each collaborator call is bounded by `timeout_ms` and retried at most
//! once after `retry_backoff_ms`. Failures surface as the [`RagError`]
//! kind of the stage that failed; nothing is replaced with a default.
//!
//! The pipeline holds no mutable state, so a single instance behind an
//! `Arc` serves any number of concurrent requests. Dropping an
//! [`answer`](RagPipeline::answer) future cancels the in-flight
//! collaborator call and no partial answer is produced.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rag_harness_core::embedding::Embedder;
use rag_harness_core::generation::{GenerationOptions, Generator};
use rag_harness_core::models::{
    new_document_id, Answer, Document, DocumentId, Metadata, NewDocument, Query, RetrievalResult,
    SourceRef,
};
use rag_harness_core::prompt::{PromptBuilder, DEFAULT_INSTRUCTION};
use rag_harness_core::ranking::rank_top_k;
use rag_harness_core::store::memory::InMemoryStore;
use rag_harness_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{is_retryable, RagError, RagResult};
use crate::generation::create_generator;
use crate::sqlite_store::SqliteStore;

/// Tuning for a [`RagPipeline`], decoupled from the TOML layout.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embedding_model: String,
    pub generation_model: String,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub instruction: String,
    pub generation: GenerationOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding_model: "disabled".to_string(),
            generation_model: "disabled".to_string(),
            top_k: 5,
            max_context_chars: 2000,
            timeout_ms: 30_000,
            retry_count: 1,
            retry_backoff_ms: 250,
            request_timeout_ms: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            generation: GenerationOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding_model: config
                .embedding
                .model
                .clone()
                .unwrap_or_else(|| config.embedding.provider.clone()),
            generation_model: config
                .generation
                .model
                .clone()
                .unwrap_or_else(|| config.generation.provider.clone()),
            top_k: config.retrieval.top_k,
            max_context_chars: config.retrieval.max_context_chars,
            timeout_ms: config.pipeline.timeout_ms,
            retry_count: config.pipeline.retry_count,
            retry_backoff_ms: config.pipeline.retry_backoff_ms,
            request_timeout_ms: config.pipeline.request_timeout_ms,
            instruction: config
                .retrieval
                .instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            generation: GenerationOptions {
                max_tokens: config.generation.max_tokens,
                temperature: config.generation.temperature,
            },
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retry_count.min(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Per-call timeout and bounded retry applied to every collaborator call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

/// Run `op` under `policy`, returning the last failure as a message.
///
/// Each attempt is bounded by `policy.timeout`. A timed-out attempt is
/// dropped, which cancels whatever request it had in flight. A
/// [`NonRetryable`](crate::error::NonRetryable) failure ends the loop at once.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    stage: &'static str,
    mut op: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = String::new();

    for attempt in 0..=policy.retries {
        if attempt > 0 {
            tracing::warn!(stage, attempt, error = %last_err, "retrying collaborator call");
            tokio::time::sleep(policy.backoff).await;
        }

        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                last_err = format!("{:#}", e);
                if !is_retryable(&e) {
                    break;
                }
            }
            Err(_) => last_err = format!("timed out after {}ms", policy.timeout.as_millis()),
        }
    }

    tracing::error!(stage, error = %last_err, "collaborator call failed");
    Err(last_err)
}

/// The answer pipeline. Cheap to share behind an `Arc`.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    prompt: PromptBuilder,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        if embedder.model_name() != config.embedding_model {
            tracing::warn!(
                configured = %config.embedding_model,
                actual = %embedder.model_name(),
                "embedding model differs from configuration"
            );
        }
        if generator.model_name() != config.generation_model {
            tracing::warn!(
                configured = %config.generation_model,
                actual = %generator.model_name(),
                "generation model differs from configuration"
            );
        }

        let prompt = PromptBuilder::new(config.instruction.clone(), config.max_context_chars);
        Self {
            embedder,
            store,
            generator,
            prompt,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer `query_text` from the stored documents.
    #[tracing::instrument(skip_all, fields(query_len = query_text.len()))]
    pub async fn answer(&self, query_text: &str) -> RagResult<Answer> {
        let query_text = require_text(query_text, "query")?;

        match self.config.request_timeout_ms {
            Some(ms) => {
                let deadline = Duration::from_millis(ms);
                tokio::time::timeout(deadline, self.answer_inner(query_text))
                    .await
                    .map_err(|_| {
                        tracing::error!(deadline_ms = ms, "request deadline exceeded");
                        RagError::Timeout(deadline)
                    })?
            }
            None => self.answer_inner(query_text).await,
        }
    }

    async fn answer_inner(&self, query_text: &str) -> RagResult<Answer> {
        let query = self.embed_query(query_text).await?;
        let context = self.search(&query).await?;
        let prompt = self.build_prompt(&query.text, &context);

        tracing::debug!(
            hits = context.len(),
            prompt_chars = prompt.chars().count(),
            "prompt assembled"
        );

        let generator = &self.generator;
        let options = &self.config.generation;
        let text = call_with_retry(self.config.retry_policy(), "generate", || {
            generator.generate(&prompt, options)
        })
        .await
        .map_err(RagError::GenerationUnavailable)?;

        if text.trim().is_empty() {
            return Err(RagError::GenerationUnavailable(
                "generator returned an empty completion".to_string(),
            ));
        }

        tracing::info!(hits = context.len(), answer_chars = text.len(), "answered query");

        Ok(Answer {
            text,
            sources: context.iter().map(SourceRef::from).collect(),
        })
    }

    /// Embed `query_text` and return the ranked top-k context, without generating.
    pub async fn retrieve(&self, query_text: &str) -> RagResult<RetrievalResult> {
        let query_text = require_text(query_text, "query")?;
        let query = self.embed_query(query_text).await?;
        self.search(&query).await
    }

    /// The prompt that would be sent for `query_text` over `context`.
    pub fn build_prompt(&self, query_text: &str, context: &RetrievalResult) -> String {
        self.prompt.build(query_text, context)
    }

    /// Embed and store a new document, returning its fresh id.
    #[tracing::instrument(skip_all, fields(text_len = document_text.len()))]
    pub async fn ingest(&self, document_text: &str, metadata: Metadata) -> RagResult<DocumentId> {
        require_text(document_text, "document text")?;

        let vector = self.embed(document_text).await?;
        let doc = NewDocument {
            id: new_document_id(),
            vector,
            text: document_text.to_string(),
            metadata,
        };

        let store = &self.store;
        call_with_retry(self.config.retry_policy(), "upsert", || store.upsert(&doc))
            .await
            .map_err(RagError::StoreUnavailable)?;

        tracing::info!(id = %doc.id, "ingested document");
        Ok(doc.id)
    }

    /// Remove a document. Returns `true` if it existed.
    pub async fn delete(&self, id: &str) -> RagResult<bool> {
        let store = &self.store;
        let removed = call_with_retry(self.config.retry_policy(), "delete", || store.delete(id))
            .await
            .map_err(RagError::StoreUnavailable)?;
        tracing::info!(id, removed, "delete document");
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> RagResult<Option<Document>> {
        let store = &self.store;
        call_with_retry(self.config.retry_policy(), "get", || store.get(id))
            .await
            .map_err(RagError::StoreUnavailable)
    }

    pub async fn document_count(&self) -> RagResult<usize> {
        let store = &self.store;
        call_with_retry(self.config.retry_policy(), "count", || store.count())
            .await
            .map_err(RagError::StoreUnavailable)
    }

    async fn embed_query(&self, query_text: &str) -> RagResult<Query> {
        Ok(Query {
            text: query_text.to_string(),
            vector: self.embed(query_text).await?,
        })
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let embedder = &self.embedder;
        let vector = call_with_retry(self.config.retry_policy(), "embed", || embedder.embed(text))
            .await
            .map_err(RagError::EmbeddingUnavailable)?;

        let expected = embedder.dims();
        if vector.is_empty() || (expected > 0 && vector.len() != expected) {
            return Err(RagError::EmbeddingUnavailable(format!(
                "expected {} dimensions, got {}",
                expected,
                vector.len()
            )));
        }
        Ok(vector)
    }

    async fn search(&self, query: &Query) -> RagResult<RetrievalResult> {
        let store = &self.store;
        let k = self.config.top_k;
        let hits = call_with_retry(self.config.retry_policy(), "search", || {
            store.search(&query.vector, k)
        })
        .await
        .map_err(RagError::RetrievalUnavailable)?;

        Ok(rank_top_k(hits, k))
    }
}

fn require_text<'a>(text: &'a str, what: &str) -> RagResult<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}

/// Build the store named by `store.provider`.
pub async fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.store.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => {
            let path = config
                .store
                .path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("store.path required for sqlite store"))?;
            Ok(Arc::new(SqliteStore::open(path).await?))
        }
        other => anyhow::bail!("Unknown store provider: {}", other),
    }
}

/// Wire a [`RagPipeline`] from configuration.
pub async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let store = create_store(config).await?;

    tracing::info!(
        embedding = %config.embedding.provider,
        generation = %config.generation.provider,
        store = %config.store.provider,
        top_k = config.retrieval.top_k,
        "pipeline configured"
    );

    Ok(RagPipeline::new(
        embedder,
        store,
        generator,
        PipelineConfig::from_config(config),
    ))
}
