//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors raised while interpreting configuration and schema text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A bucket boundary is not a finite number
    #[error("Invalid bucket boundary in {field}: {value}")]
    InvalidBucket { field: String, value: String },

    /// Bucket boundaries must grow strictly
    #[error("Buckets in {field} must be strictly increasing ({previous} >= {next})")]
    UnorderedBuckets {
        field: String,
        previous: f64,
        next: f64,
    },

    /// Label name does not match `[a-zA-Z_][a-zA-Z0-9_]*`
    #[error("Invalid label name: {name}")]
    InvalidLabelName { name: String },

    /// Same label name listed twice
    #[error("Duplicate label name: {name}")]
    DuplicateLabelName { name: String },

    /// Configuration file could not be read or parsed
    #[error("Failed to load configuration: {reason}")]
    Config { reason: String },
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
