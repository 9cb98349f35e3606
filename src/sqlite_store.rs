//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs next to the document text.
//! Search loads every vector and ranks by cosine similarity in process,
//! which is adequate for small and medium corpora.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::path::Path;

use rag_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use rag_harness_core::models::{content_hash, Document, Metadata, NewDocument, ScoredDocument};
use rag_harness_core::ranking::rank_top_k;
use rag_harness_core::store::VectorStore;

use crate::db;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open sqlite store at {}", path.display()))?;
        Ok(Self::new(pool))
    }
}

fn parse_metadata(id: &str, raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .with_context(|| format!("Corrupt metadata_json for document {}", id))
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let blob: Vec<u8> = row.get("embedding");
    let metadata_json: String = row.get("metadata_json");
    Ok(Document {
        metadata: parse_metadata(&id, &metadata_json)?,
        id,
        text: row.get("text"),
        vector: blob_to_vec(&blob),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let rows = sqlx::query("SELECT id, text, metadata_json, embedding FROM documents")
            .fetch_all(&self.pool)
            .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                Ok(ScoredDocument {
                    metadata: parse_metadata(&id, &metadata_json)?,
                    id,
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                    text: row.get("text"),
                })
            })
            .collect::<Result<Vec<ScoredDocument>>>()?;

        Ok(rank_top_k(hits, k))
    }

    async fn upsert(&self, doc: &NewDocument) -> Result<()> {
        let metadata_json = serde_json::to_string(&doc.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO documents (id, text, metadata_json, embedding, dims, content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding,
                dims = excluded.dims,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.text)
        .bind(&metadata_json)
        .bind(vec_to_blob(&doc.vector))
        .bind(doc.vector.len() as i64)
        .bind(content_hash(&doc.text))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, text, metadata_json, embedding, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
