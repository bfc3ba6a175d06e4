//! Error types for the coach chat backend

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// Product metadata missing or unparseable. Fatal at startup — the
    /// process must not serve traffic without metadata.
    #[error("Metadata error: {0}")]
    MetadataError(String),

    /// An external classifier call failed (timeout, transport error,
    /// malformed response). Never interpreted as an implicit allow or
    /// reject.
    #[error("Classifier error: {0}")]
    ClassifierError(String),

    /// The LLM completion call failed after guardrails passed.
    #[error("Completion error: {0}")]
    CompletionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
