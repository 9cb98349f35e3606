//! # RAG Harness CLI (`rag`)
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ask "<question>"` | Answer a question from the stored documents |
//! | `rag retrieve "<question>"` | Show the ranked context without generating |
//! | `rag ingest --file notes.md` | Embed and store a document |
//! | `rag get <id>` | Print a stored document |
//! | `rag delete <id>` | Remove a stored document |
//! | `rag serve` | Start the REST server |
//!
//! One-shot commands only see previously ingested documents when
//! `[store] provider = "sqlite"`; the in-memory store lives for one process.
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_harness::{commands, config, server};

/// RAG Harness: answer questions grounded in your own documents.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "RAG Harness: retrieval-augmented answering over a vector store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question using retrieved context.
    Ask {
        /// The question.
        query: String,

        /// Also print the ids and scores of the documents used as context.
        #[arg(long)]
        sources: bool,
    },

    /// Show the ranked context for a question without calling the generator.
    Retrieve {
        query: String,

        /// Print the full prompt that `ask` would send.
        #[arg(long)]
        prompt: bool,
    },

    /// Embed and store a document.
    Ingest {
        /// Read the document text from this file.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Use this literal text as the document.
        #[arg(long)]
        text: Option<String>,

        /// Metadata as `key=value` pairs.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Print a stored document.
    Get { id: String },

    /// Remove a stored document.
    Delete { id: String },

    /// Start the REST server on `[server].bind`.
    Serve,
}

/// Parse a `key=value` pair for `--meta` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ask { query, sources } => {
            commands::run_ask(&cfg, &query, sources).await?;
        }
        Commands::Retrieve { query, prompt } => {
            commands::run_retrieve(&cfg, &query, prompt).await?;
        }
        Commands::Ingest { file, text, meta } => {
            commands::run_ingest(&cfg, file, text, meta).await?;
        }
        Commands::Get { id } => {
            commands::run_get(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            commands::run_delete(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
