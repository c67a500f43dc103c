//! Error types for cohort-types crate.

use thiserror::Error;

/// Errors raised while adapting upstream records to canonical shapes.
///
/// Only structurally unusable records fail; unreadable dates are repaired
/// and flagged instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// A required field is missing or empty.
    #[error("{record} record is missing required field `{field}`")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// The payload is not a JSON object or is otherwise malformed.
    #[error("malformed {record} record: {reason}")]
    Malformed {
        record: &'static str,
        reason: String,
    },
}

/// Result type for normalization operations.
pub type TypesResult<T> = Result<T, TypesError>;
