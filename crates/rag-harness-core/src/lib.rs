//! # RAG Harness Core
//!
//! Runtime-free logic for RAG Harness: the data model, the three
//! collaborator traits ([`Embedder`](embedding::Embedder),
//! [`VectorStore`](store::VectorStore), [`Generator`](generation::Generator)),
//! deterministic ranking, prompt construction, and an in-memory vector store.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Timeouts, retries, and concrete adapters live in the `rag-harness`
//! application crate.

pub mod embedding;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod ranking;
pub mod store;
