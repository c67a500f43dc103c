//! Error types for cohort-submissions crate.

use thiserror::Error;

/// Errors that can occur while reading or writing submissions.
///
/// `Clone` because one failed fetch is handed to every collapsed waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// Transport failure: connection refused, timeout, TLS, ...
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response from the record store.
    #[error("API error: {status} - {error}")]
    Api {
        status: u16,
        error: String,
        details: Option<String>,
    },

    /// The response body could not be read as the expected shape.
    #[error("response decode error: {0}")]
    Decode(String),

    /// The background fetch task ended without producing a result.
    #[error("fetch aborted: {0}")]
    Aborted(String),

    /// The submission was rejected before reaching the record store.
    #[error("invalid submission: {0}")]
    Invalid(String),

    /// Client construction or configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SubmissionError::Decode(e.to_string())
        } else if e.is_builder() {
            SubmissionError::Configuration(e.to_string())
        } else {
            SubmissionError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SubmissionError {
    fn from(e: serde_json::Error) -> Self {
        SubmissionError::Decode(e.to_string())
    }
}

impl From<cohort_types::TypesError> for SubmissionError {
    fn from(e: cohort_types::TypesError) -> Self {
        SubmissionError::Decode(e.to_string())
    }
}

/// Result type for submission operations.
pub type SubmissionResult<T> = Result<T, SubmissionError>;
