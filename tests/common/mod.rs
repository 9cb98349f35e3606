//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rag_harness::pipeline::{PipelineConfig, RagPipeline};
use rag_harness_core::embedding::Embedder;
use rag_harness_core::generation::{GenerationOptions, Generator};
use rag_harness_core::models::{Document, Metadata, NewDocument, ScoredDocument};
use rag_harness_core::store::memory::InMemoryStore;
use rag_harness_core::store::VectorStore;

// ─── Embedder ───────────────────────────────────────────────────────

/// Embeds text as keyword presence over a tiny vocabulary.
///
/// `[rust, python, docker, 0.01]`, so every vector is non-zero.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail_first: AtomicUsize,
    pub dims_override: Option<usize>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            fail_first: AtomicUsize::new(0),
            dims_override: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn failing_first(n: usize) -> Self {
        let e = Self::new();
        e.fail_first.store(n, Ordering::SeqCst);
        e
    }

    /// Returns vectors whose length disagrees with `dims()`.
    pub fn malformed() -> Self {
        Self {
            dims_override: Some(2),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let flag = |word: &str| if lower.contains(word) { 1.0 } else { 0.0 };
    vec![flag("rust"), flag("python"), flag("docker"), 0.01]
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            bail!("embedding service unreachable");
        }
        let mut v = keyword_vector(text);
        if let Some(d) = self.dims_override {
            v.truncate(d);
        }
        Ok(v)
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Records every prompt it receives and replies with a fixed answer.
pub struct RecordingGenerator {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail_first: AtomicUsize,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            delay: None,
            fail_first: AtomicUsize::new(0),
        }
    }

    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(reply)
        }
    }

    pub fn failing_first(reply: &str, n: usize) -> Self {
        let g = Self::new(reply);
        g.fail_first.store(n, Ordering::SeqCst);
        g
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording-test"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            bail!("generation backend returned 503");
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

// ─── Stores ─────────────────────────────────────────────────────────

/// Returns a fixed set of hits, in the order given, regardless of the query.
pub struct ScriptedStore {
    pub hits: Vec<ScoredDocument>,
}

impl ScriptedStore {
    pub fn new(entries: &[(&str, f32, &str)]) -> Self {
        Self {
            hits: entries
                .iter()
                .map(|(id, score, text)| ScoredDocument {
                    id: id.to_string(),
                    score: *score,
                    text: text.to_string(),
                    metadata: Metadata::new(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn search(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredDocument>> {
        Ok(self.hits.clone())
    }
    async fn upsert(&self, _doc: &NewDocument) -> Result<()> {
        bail!("scripted store is read-only")
    }
    async fn delete(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }
    async fn get(&self, _id: &str) -> Result<Option<Document>> {
        Ok(None)
    }
    async fn count(&self) -> Result<usize> {
        Ok(self.hits.len())
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl VectorStore for BrokenStore {
    async fn search(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredDocument>> {
        bail!("vector database connection reset")
    }
    async fn upsert(&self, _doc: &NewDocument) -> Result<()> {
        bail!("vector database connection reset")
    }
    async fn delete(&self, _id: &str) -> Result<bool> {
        bail!("vector database connection reset")
    }
    async fn get(&self, _id: &str) -> Result<Option<Document>> {
        bail!("vector database connection reset")
    }
    async fn count(&self) -> Result<usize> {
        bail!("vector database connection reset")
    }
}

// ─── Wiring ─────────────────────────────────────────────────────────

pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        embedding_model: "keyword-test".to_string(),
        generation_model: "recording-test".to_string(),
        timeout_ms: 200,
        retry_count: 1,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

pub fn pipeline_with(
    embedder: Arc<KeywordEmbedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<RecordingGenerator>,
    config: PipelineConfig,
) -> RagPipeline {
    RagPipeline::new(embedder, store, generator, config)
}

pub fn memory_pipeline(
    embedder: Arc<KeywordEmbedder>,
    generator: Arc<RecordingGenerator>,
) -> RagPipeline {
    pipeline_with(
        embedder,
        Arc::new(InMemoryStore::new()),
        generator,
        fast_config(),
    )
}
