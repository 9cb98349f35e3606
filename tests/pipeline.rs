//! End-to-end behaviour of `RagPipeline` against fake collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rag_harness::error::RagError;
use rag_harness::pipeline::{PipelineConfig, RagPipeline};
use rag_harness::sqlite_store::SqliteStore;
use rag_harness_core::models::Metadata;
use rag_harness_core::prompt::DEFAULT_INSTRUCTION;
use rag_harness_core::store::memory::InMemoryStore;
use rag_harness_core::store::VectorStore;
use serde_json::json;
use tempfile::TempDir;

use common::*;

fn ids(pipeline_hits: &[rag_harness_core::models::ScoredDocument]) -> Vec<&str> {
    pipeline_hits.iter().map(|h| h.id.as_str()).collect()
}

#[tokio::test]
async fn test_empty_store_still_generates() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let generator = Arc::new(RecordingGenerator::new("Hi there."));
    let pipeline = memory_pipeline(embedder.clone(), generator.clone());

    let answer = pipeline.answer("hello").await.unwrap();

    assert_eq!(answer.text, "Hi there.");
    assert!(answer.sources.is_empty());
    assert_eq!(generator.completed(), 1);
    assert_eq!(
        generator.prompts()[0],
        format!("{}\n\nQuestion: hello", DEFAULT_INSTRUCTION)
    );
}

#[tokio::test]
async fn test_embedder_timeout_never_reaches_generator() {
    let embedder = Arc::new(KeywordEmbedder::slow(Duration::from_secs(2)));
    let generator = Arc::new(RecordingGenerator::new("unused"));
    let config = PipelineConfig {
        timeout_ms: 30,
        ..fast_config()
    };
    let pipeline = pipeline_with(
        embedder.clone(),
        Arc::new(InMemoryStore::new()),
        generator.clone(),
        config,
    );

    let err = pipeline.answer("hello").await.unwrap_err();

    match err {
        RagError::EmbeddingUnavailable(msg) => assert!(msg.contains("timed out")),
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
    // One retry after the first timeout.
    assert_eq!(embedder.calls(), 2);
    assert_eq!(generator.started(), 0);
}

#[tokio::test]
async fn test_top_k_ties_broken_by_id() {
    let store = Arc::new(ScriptedStore::new(&[
        ("d4", 0.5, "four"),
        ("d2", 0.9, "two"),
        ("d5", 0.1, "five"),
        ("d3", 0.7, "three"),
        ("d1", 0.9, "one"),
    ]));
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let config = PipelineConfig {
        top_k: 3,
        ..fast_config()
    };
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        store,
        generator.clone(),
        config,
    );

    let hits = pipeline.retrieve("anything").await.unwrap();
    assert_eq!(ids(&hits), vec!["d1", "d2", "d3"]);

    let answer = pipeline.answer("anything").await.unwrap();
    let source_ids: Vec<&str> = answer.sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(source_ids, vec!["d1", "d2", "d3"]);

    let prompt = &generator.prompts()[0];
    let one = prompt.find("[1] (id: d1)").unwrap();
    let two = prompt.find("[2] (id: d2)").unwrap();
    let three = prompt.find("[3] (id: d3)").unwrap();
    assert!(one < two && two < three);
    assert!(!prompt.contains("(id: d4)"));
}

#[tokio::test]
async fn test_repeated_queries_build_identical_prompts() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = memory_pipeline(embedder, generator.clone());

    for text in [
        "Rust ownership rules",
        "Rust and Docker images",
        "Python packaging",
        "Docker compose basics",
    ] {
        pipeline.ingest(text, Metadata::new()).await.unwrap();
    }

    let first = pipeline.retrieve("how does rust work?").await.unwrap();
    let second = pipeline.retrieve("how does rust work?").await.unwrap();
    assert_eq!(first, second);

    pipeline.answer("how does rust work?").await.unwrap();
    pipeline.answer("how does rust work?").await.unwrap();
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_context_truncated_to_budget() {
    let long_a = "a".repeat(500);
    let long_b = "b".repeat(500);
    let store = Arc::new(ScriptedStore::new(&[
        ("d1", 0.9, long_a.as_str()),
        ("d2", 0.8, long_b.as_str()),
    ]));
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let config = PipelineConfig {
        max_context_chars: 10,
        ..fast_config()
    };
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        store,
        generator.clone(),
        config,
    );

    pipeline.answer("q").await.unwrap();
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains(&"a".repeat(10)));
    assert!(!prompt.contains(&"a".repeat(11)));
    assert!(prompt.contains(&"b".repeat(10)));
    assert!(!prompt.contains(&"b".repeat(11)));
}

#[tokio::test]
async fn test_ingest_does_not_deduplicate() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        store.clone(),
        Arc::new(RecordingGenerator::new("ok")),
        fast_config(),
    );

    let mut meta = Metadata::new();
    meta.insert("title".into(), json!("Guide"));
    let a = pipeline.ingest("same text", meta.clone()).await.unwrap();
    let b = pipeline.ingest("same text", meta).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(store.count().await.unwrap(), 2);
    let stored = store.get(&a).await.unwrap().unwrap();
    assert_eq!(stored.metadata["title"], "Guide");
    assert_eq!(stored.vector.len(), 4);
}

#[tokio::test]
async fn test_blank_input_is_rejected_without_calls() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = memory_pipeline(embedder.clone(), generator.clone());

    assert!(matches!(
        pipeline.answer("   \t\n").await,
        Err(RagError::InvalidInput(_))
    ));
    assert!(matches!(
        pipeline.retrieve("").await,
        Err(RagError::InvalidInput(_))
    ));
    assert!(matches!(
        pipeline.ingest("  ", Metadata::new()).await,
        Err(RagError::InvalidInput(_))
    ));
    assert_eq!(embedder.calls(), 0);
    assert_eq!(generator.started(), 0);
}

#[tokio::test]
async fn test_wrong_dimensionality_is_embedding_failure() {
    let embedder = Arc::new(KeywordEmbedder::malformed());
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = memory_pipeline(embedder.clone(), generator.clone());

    match pipeline.answer("rust").await {
        Err(RagError::EmbeddingUnavailable(msg)) => {
            assert!(msg.contains("expected 4 dimensions, got 2"))
        }
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
    assert_eq!(embedder.calls(), 1);
    assert_eq!(generator.started(), 0);
}

#[tokio::test]
async fn test_single_embedding_failure_is_retried() {
    let embedder = Arc::new(KeywordEmbedder::failing_first(1));
    let generator = Arc::new(RecordingGenerator::new("recovered"));
    let pipeline = memory_pipeline(embedder.clone(), generator);

    let answer = pipeline.answer("rust").await.unwrap();
    assert_eq!(answer.text, "recovered");
    assert_eq!(embedder.calls(), 2);
}

#[tokio::test]
async fn test_retry_disabled_surfaces_first_failure() {
    let embedder = Arc::new(KeywordEmbedder::failing_first(1));
    let config = PipelineConfig {
        retry_count: 0,
        ..fast_config()
    };
    let pipeline = pipeline_with(
        embedder.clone(),
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingGenerator::new("ok")),
        config,
    );

    match pipeline.answer("rust").await {
        Err(RagError::EmbeddingUnavailable(msg)) => assert!(msg.contains("unreachable")),
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
    assert_eq!(embedder.calls(), 1);
}

#[tokio::test]
async fn test_store_failure_is_retrieval_unavailable() {
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        Arc::new(BrokenStore),
        generator.clone(),
        fast_config(),
    );

    assert!(matches!(
        pipeline.answer("rust").await,
        Err(RagError::RetrievalUnavailable(_))
    ));
    assert!(matches!(
        pipeline.ingest("rust", Metadata::new()).await,
        Err(RagError::StoreUnavailable(_))
    ));
    assert!(matches!(
        pipeline.delete("x").await,
        Err(RagError::StoreUnavailable(_))
    ));
    assert_eq!(generator.started(), 0);
}

#[tokio::test]
async fn test_generation_retried_once_then_fails() {
    let generator = Arc::new(RecordingGenerator::failing_first("late", 1));
    let pipeline = memory_pipeline(Arc::new(KeywordEmbedder::new()), generator.clone());
    assert_eq!(pipeline.answer("rust").await.unwrap().text, "late");
    assert_eq!(generator.started(), 2);

    let generator = Arc::new(RecordingGenerator::failing_first("never", 5));
    let pipeline = memory_pipeline(Arc::new(KeywordEmbedder::new()), generator.clone());
    match pipeline.answer("rust").await {
        Err(RagError::GenerationUnavailable(msg)) => assert!(msg.contains("503")),
        other => panic!("expected GenerationUnavailable, got {:?}", other),
    }
    assert_eq!(generator.started(), 2);
}

#[tokio::test]
async fn test_empty_completion_is_an_error() {
    let generator = Arc::new(RecordingGenerator::new("   "));
    let pipeline = memory_pipeline(Arc::new(KeywordEmbedder::new()), generator);

    assert!(matches!(
        pipeline.answer("rust").await,
        Err(RagError::GenerationUnavailable(_))
    ));
}

#[tokio::test]
async fn test_request_deadline_yields_timeout() {
    let generator = Arc::new(RecordingGenerator::slow("late", Duration::from_millis(500)));
    let config = PipelineConfig {
        timeout_ms: 5_000,
        request_timeout_ms: Some(50),
        ..fast_config()
    };
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        Arc::new(InMemoryStore::new()),
        generator.clone(),
        config,
    );

    match pipeline.answer("rust").await {
        Err(RagError::Timeout(d)) => assert_eq!(d, Duration::from_millis(50)),
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(generator.completed(), 0);
}

#[tokio::test]
async fn test_dropping_answer_cancels_generation() {
    let generator = Arc::new(RecordingGenerator::slow("late", Duration::from_millis(200)));
    let config = PipelineConfig {
        timeout_ms: 5_000,
        ..fast_config()
    };
    let pipeline = pipeline_with(
        Arc::new(KeywordEmbedder::new()),
        Arc::new(InMemoryStore::new()),
        generator.clone(),
        config,
    );

    let outcome = tokio::time::timeout(Duration::from_millis(50), pipeline.answer("rust")).await;
    assert!(outcome.is_err(), "caller deadline should fire first");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(generator.started(), 1);
    assert_eq!(generator.completed(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_pipeline() {
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = Arc::new(memory_pipeline(
        Arc::new(KeywordEmbedder::new()),
        generator.clone(),
    ));
    pipeline
        .ingest("Rust is a systems language", Metadata::new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let p = pipeline.clone();
        handles.push(tokio::spawn(async move {
            p.answer(&format!("rust question {}", i)).await
        }));
    }
    for handle in handles {
        let answer = handle.await.unwrap().unwrap();
        assert_eq!(answer.sources.len(), 1);
    }
    assert_eq!(generator.completed(), 16);
}

#[tokio::test]
async fn test_ingested_document_grounds_answer() {
    let generator = Arc::new(RecordingGenerator::new("Use cargo."));
    let pipeline = memory_pipeline(Arc::new(KeywordEmbedder::new()), generator.clone());

    let rust_id = pipeline
        .ingest("Rust projects are built with cargo.", Metadata::new())
        .await
        .unwrap();
    pipeline
        .ingest("Python projects use pip.", Metadata::new())
        .await
        .unwrap();

    let answer = pipeline.answer("How do I build a Rust project?").await.unwrap();
    assert_eq!(answer.text, "Use cargo.");
    assert_eq!(answer.sources[0].id, rust_id);
    assert!(generator.prompts()[0].contains("[1] (id: "));
    assert!(generator.prompts()[0].contains("built with cargo"));
    assert!(generator.prompts()[0].ends_with("Question: How do I build a Rust project?"));
}

#[tokio::test]
async fn test_sqlite_backed_pipeline() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&tmp.path().join("rag.sqlite")).await.unwrap());
    let generator = Arc::new(RecordingGenerator::new("Containers."));
    let pipeline = RagPipeline::new(
        Arc::new(KeywordEmbedder::new()),
        store,
        generator,
        fast_config(),
    );

    let id = pipeline
        .ingest("Docker builds container images.", Metadata::new())
        .await
        .unwrap();
    assert_eq!(pipeline.document_count().await.unwrap(), 1);

    let answer = pipeline.answer("what is docker?").await.unwrap();
    assert_eq!(answer.sources[0].id, id);

    assert!(pipeline.delete(&id).await.unwrap());
    assert!(pipeline.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_configured_pipeline_with_disabled_providers() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("data").join("rag.sqlite");
    let config = rag_harness::config::parse_config(&format!(
        "[store]\nprovider = \"sqlite\"\npath = \"{}\"\n\n[pipeline]\nretry_backoff_ms = 1\n",
        db.display()
    ))
    .unwrap();

    let pipeline = rag_harness::pipeline::build_pipeline(&config).await.unwrap();
    assert!(db.exists());
    assert_eq!(pipeline.document_count().await.unwrap(), 0);

    match pipeline.answer("hello").await {
        Err(RagError::EmbeddingUnavailable(msg)) => assert!(msg.contains("disabled")),
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_stored_metadata_fails_retrieval() {
    let tmp = TempDir::new().unwrap();
    let pool = rag_harness::db::connect(&tmp.path().join("rag.sqlite"))
        .await
        .unwrap();
    let generator = Arc::new(RecordingGenerator::new("unused"));
    let pipeline = RagPipeline::new(
        Arc::new(KeywordEmbedder::new()),
        Arc::new(SqliteStore::new(pool.clone())),
        generator.clone(),
        fast_config(),
    );

    let id = pipeline.ingest("Rust notes", Metadata::new()).await.unwrap();
    sqlx::query("UPDATE documents SET metadata_json = 'oops' WHERE id = ?")
        .bind(&id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        pipeline.answer("rust").await,
        Err(RagError::RetrievalUnavailable(_))
    ));
    assert!(matches!(
        pipeline.get(&id).await,
        Err(RagError::StoreUnavailable(_))
    ));
    assert_eq!(generator.started(), 0);
}

#[tokio::test]
async fn test_prompt_uses_normalised_query_text() {
    let generator = Arc::new(RecordingGenerator::new("ok"));
    let pipeline = memory_pipeline(Arc::new(KeywordEmbedder::new()), generator.clone());

    pipeline.answer("  \twhat is rust?\n ").await.unwrap();

    let prompt = &generator.prompts()[0];
    assert!(prompt.ends_with("\n\nQuestion: what is rust?"), "{}", prompt);
}
