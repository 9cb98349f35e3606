//! Pipeline error taxonomy.
//!
//! Adapters report failures as `anyhow::Error`. The pipeline converts each
//! failure into exactly one [`RagError`] kind, keeping the underlying
//! message, so callers can branch on the kind without parsing strings.

use std::time::Duration;

use reqwest::StatusCode;

pub type RagResult<T> = Result<T, RagError>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl RagError {
    /// Machine-readable error code used in HTTP responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::InvalidInput(_) => "invalid_input",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::RetrievalUnavailable(_) => "retrieval_unavailable",
            RagError::GenerationUnavailable(_) => "generation_unavailable",
            RagError::StoreUnavailable(_) => "store_unavailable",
            RagError::Timeout(_) => "timeout",
        }
    }
}

/// A collaborator failure that another attempt cannot fix.
///
/// Adapters return it inside `anyhow::Error`; the pipeline's retry loop
/// downcasts for it and stops after the first attempt.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NonRetryable(pub String);

/// Returns `true` if `err` carries a [`NonRetryable`] marker.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<NonRetryable>().is_none()
}

/// Error for a non-success provider response.
///
/// 429 and 5xx are transient; any other status (bad key, unknown model,
/// malformed request) is [`NonRetryable`].
pub fn provider_status_error(provider: &str, status: StatusCode, body: &str) -> anyhow::Error {
    let message = format!("{} API error {}: {}", provider, status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        anyhow::anyhow!(message)
    } else {
        NonRetryable(message).into()
    }
}
