//! Error types shared across the scrape pipeline and the store.
//!
//! Extraction errors are recoverable: the orchestration in
//! [`scrape`](crate::scrape) logs them and switches to the heuristic
//! fallback. Storage and page errors are surfaced to the user verbatim.

use thiserror::Error;

/// Failures of the structured-extraction call.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The request to the model endpoint did not complete.
    #[error("Network error: {0}")]
    Network(String),

    /// The model endpoint answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// No API key in settings or in the environment.
    #[error("API key not configured")]
    MissingApiKey,

    /// The reply could not be read as the expected JSON shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ExtractionError {
    /// Whether the failure happened before a reply was available
    /// (as opposed to a reply that failed to parse).
    pub fn is_request_failure(&self) -> bool {
        !matches!(self, ExtractionError::MalformedResponse(_))
    }
}

/// Failures reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures that abort a whole scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid page URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("page {url} answered with status {status}")]
    PageStatus { url: String, status: u16 },
}
