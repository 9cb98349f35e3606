//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the only storage interface the pipeline
//! talks to, so backends (in-memory, SQLite, hosted vector databases) are
//! interchangeable. Implementations must be `Send + Sync` and safe for
//! concurrent use by many in-flight requests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, NewDocument, ScoredDocument};

/// Abstract vector-store collaborator.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`search`](VectorStore::search) | Top-k nearest documents for a query vector |
/// | [`upsert`](VectorStore::upsert) | Insert or replace a document by id |
/// | [`delete`](VectorStore::delete) | Remove a document by id |
/// | [`get`](VectorStore::get) | Fetch a stored document by id |
/// | [`count`](VectorStore::count) | Number of stored documents |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `k` documents most similar to `vector`, best first.
    ///
    /// The pipeline re-ranks the returned hits, so adapters that cannot
    /// guarantee the tie-break order are still correct.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Insert or replace a document.
    async fn upsert(&self, doc: &NewDocument) -> Result<()>;

    /// Remove a document. Returns `true` if a document was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Fetch a stored document by id.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;
}
