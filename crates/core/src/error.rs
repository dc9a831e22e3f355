//! Error types for the compliance assistant.
//!
//! A single error enum covers configuration, provider, retrieval and
//! prompt failures. Inside the answering pipeline most of these are
//! recovered locally (a failed source becomes missing evidence, a failed
//! generation becomes a degraded answer); only cancellation escapes.

use thiserror::Error;

/// Unified error type for the compliance assistant.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic: errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text generation provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Corpus index errors
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Web search provider errors
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An external call exceeded its deadline
    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    /// The caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from the caller abandoning the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
