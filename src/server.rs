//! REST server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question: `{ "query": "..." }` → `{ "answer": "...", "sources": [...] }` |
//! | `POST` | `/api/retrieve` | Ranked context only, no generation |
//! | `POST` | `/api/documents` | Ingest `{ "text": "...", "metadata": {...} }` → `{ "id": "..." }` |
//! | `GET`  | `/api/documents/{id}` | Fetch a stored document (without its vector) |
//! | `DELETE` | `/api/documents/{id}` | Remove a stored document |
//! | `GET`  | `/health` | Health check with version and document count |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_input", "message": "invalid input: query must not be empty" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `invalid_input` | 400 |
//! | `not_found` | 404 |
//! | `embedding_unavailable`, `retrieval_unavailable`, `generation_unavailable`, `store_unavailable` | 503 |
//! | `timeout` | 504 |
//!
//! Malformed request bodies (invalid JSON, missing fields, wrong content
//! type) are reported as `invalid_input` in the same envelope.
//!
//! A client that disconnects mid-request drops the handler future, which
//! cancels the collaborator call in flight.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rag_harness_core::models::{Document, Metadata, ScoredDocument, SourceRef};

use crate::config::Config;
use crate::error::RagError;
use crate::pipeline::{build_pipeline, RagPipeline};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<RagPipeline>,
}

/// Build the router for `pipeline`. Exposed so tests can serve it on an ephemeral port.
pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/retrieve", post(handle_retrieve))
        .route("/api/documents", post(handle_ingest))
        .route(
            "/api/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { pipeline })
}

/// Serve `pipeline` on an already-bound listener until ctrl-c.
pub async fn serve(
    listener: tokio::net::TcpListener,
    pipeline: Arc<RagPipeline>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Build the pipeline from `config` and serve it on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    serve(listener, pipeline).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RagError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RagError::EmbeddingUnavailable(_)
            | RagError::RetrievalUnavailable(_)
            | RagError::GenerationUnavailable(_)
            | RagError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_input".to_string(),
            message: format!("invalid input: {}", rejection.body_text()),
        }
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let documents = state.pipeline.document_count().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents,
    }))
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = payload?;
    let answer = state.pipeline.answer(&req.query).await?;
    Ok(Json(QueryResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}

// ============ POST /api/retrieve ============

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<ScoredDocument>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let Json(req) = payload?;
    let results = state.pipeline.retrieve(&req.query).await?;
    Ok(Json(RetrieveResponse { results }))
}

// ============ /api/documents ============

#[derive(Deserialize)]
struct IngestRequest {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Serialize)]
struct IngestResponse {
    id: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let Json(req) = payload?;
    let id = state.pipeline.ingest(&req.text, req.metadata).await?;
    Ok((StatusCode::CREATED, Json(IngestResponse { id })))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let mut doc = state
        .pipeline
        .get(&id)
        .await?
        .ok_or_else(|| not_found(format!("no document with id: {}", id)))?;
    doc.vector.clear();
    Ok(Json(doc))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.pipeline.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no document with id: {}", id)))
    }
}
