//! CLI command implementations. Each `run_*` builds a pipeline from the
//! configuration, performs one operation, and prints to stdout.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use rag_harness_core::models::Metadata;

use crate::config::Config;
use crate::pipeline::build_pipeline;

pub async fn run_ask(config: &Config, query: &str, show_sources: bool) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let answer = pipeline.answer(query).await?;

    println!("{}", answer.text);

    if show_sources {
        println!();
        if answer.sources.is_empty() {
            println!("(no context documents)");
        }
        for (i, source) in answer.sources.iter().enumerate() {
            println!("[{}] {} (score: {:.4})", i + 1, source.id, source.score);
        }
    }
    Ok(())
}

pub async fn run_retrieve(config: &Config, query: &str, show_prompt: bool) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let results = pipeline.retrieve(query).await?;

    if results.is_empty() {
        println!("No results.");
    }
    for (i, hit) in results.iter().enumerate() {
        let preview: String = hit.text.chars().take(120).collect();
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.id);
        println!("    {}", preview.replace('\n', " "));
    }

    if show_prompt {
        println!();
        println!("{}", pipeline.build_prompt(query.trim(), &results));
    }
    Ok(())
}

pub async fn run_ingest(
    config: &Config,
    file: Option<PathBuf>,
    text: Option<String>,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let mut metadata = Metadata::new();

    let body = match (file, text) {
        (Some(path), None) => {
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            metadata.insert(
                "path".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );
            body
        }
        (None, Some(text)) => text,
        _ => bail!("Provide exactly one of --file or --text"),
    };

    for (key, value) in meta {
        metadata.insert(key, serde_json::Value::String(value));
    }

    let pipeline = build_pipeline(config).await?;
    let id = pipeline.ingest(&body, metadata).await?;
    println!("{}", id);
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    match pipeline.get(id).await? {
        Some(doc) => {
            println!("id: {}", doc.id);
            println!("created_at: {}", format_ts_iso(doc.created_at));
            println!("dims: {}", doc.vector.len());
            println!("metadata: {}", serde_json::Value::Object(doc.metadata));
            println!("---");
            println!("{}", doc.text);
            Ok(())
        }
        None => bail!("Document not found: {}", id),
    }
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    if pipeline.delete(id).await? {
        println!("deleted {}", id);
        Ok(())
    } else {
        bail!("Document not found: {}", id)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
