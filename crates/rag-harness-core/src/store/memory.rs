//! In-memory [`VectorStore`] implementation for tests and single-process use.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Document, NewDocument, ScoredDocument};
use crate::ranking::rank_top_k;

use super::VectorStore;

/// In-memory vector store.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let hits: Vec<ScoredDocument> = docs
            .values()
            .map(|d| ScoredDocument {
                id: d.id.clone(),
                score: cosine_similarity(vector, &d.vector),
                text: d.text.clone(),
                metadata: d.metadata.clone(),
            })
            .collect();
        Ok(rank_top_k(hits, k))
    }

    async fn upsert(&self, doc: &NewDocument) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        docs.insert(
            doc.id.clone(),
            Document {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                vector: doc.vector.clone(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        Ok(docs.remove(id).is_some())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.len())
    }
}
