//! # RAG Harness
//!
//! Retrieval-augmented answering over a vector store: embed the question,
//! retrieve the k most similar documents, build a prompt from them, and
//! hand it to a text-generation backend.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌────────────┐
//!   query ────────▶│  Embedder  │ OpenAI / Ollama
//!                  └─────┬──────┘
//!                        ▼
//!                  ┌────────────┐
//!                  │VectorStore │ memory / SQLite
//!                  └─────┬──────┘
//!                        ▼ top-k (score desc, id asc)
//!                  ┌────────────┐
//!                  │  Prompt    │ instruction + context + question
//!                  └─────┬──────┘
//!                        ▼
//!                  ┌────────────┐
//!   answer ◀───────│ Generator  │ OpenAI / Ollama
//!                  └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Pipeline error taxonomy |
//! | [`embedding`] | Embedding adapters |
//! | [`generation`] | Text-generation adapters |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`db`] | SQLite connection and schema |
//! | [`pipeline`] | The answer/ingest orchestrator |
//! | [`server`] | REST server |
//! | [`commands`] | CLI command implementations |
//!
//! The runtime-free pieces (data model, collaborator traits, ranking,
//! prompt construction, in-memory store) live in `rag-harness-core`.

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod server;
pub mod sqlite_store;
