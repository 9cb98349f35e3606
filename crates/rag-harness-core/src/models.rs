//! Core data models that flow through ingestion and answering.
//!
//! A [`Document`] is the only entity that outlives a request. Everything
//! else ([`Query`], [`ScoredDocument`], [`Answer`]) is created per call and
//! dropped when the call returns.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Free-form JSON object attached to a document at ingestion time.
///
/// Stored and returned verbatim; never interpreted by the pipeline.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Opaque identifier assigned to a document when it is ingested.
pub type DocumentId = String;

/// Generate a fresh document identifier (UUID v4).
///
/// Every call returns a new id, so ingesting identical text twice
/// produces two distinct documents.
pub fn new_document_id() -> DocumentId {
    Uuid::new_v4().to_string()
}

/// SHA-256 hex digest of a document's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A stored unit of text with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub metadata: Metadata,
    /// Embedding vector; its length matches the configured model's dims.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    /// Unix timestamp (seconds) of ingestion.
    pub created_at: i64,
}

/// Input to [`VectorStore::upsert`](crate::store::VectorStore::upsert).
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: DocumentId,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// An ephemeral user query and its embedding.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub vector: Vec<f32>,
}

/// One retrieval hit: a stored document and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub id: DocumentId,
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
}

/// Ordered retrieval hits, best first. Length is at most the configured k.
pub type RetrievalResult = Vec<ScoredDocument>;

/// Reference to a document that was used as answer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: DocumentId,
    pub score: f32,
}

impl From<&ScoredDocument> for SourceRef {
    fn from(hit: &ScoredDocument) -> Self {
        Self {
            id: hit.id.clone(),
            score: hit.score,
        }
    }
}

/// The generator's output plus the context it was conditioned on.
///
/// `text` is exactly what the generation backend returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}
