// ⚠️ Error Types - fatal storage failures vs. recoverable parse failures
//
// Storage errors abort a stage. Parse errors abort the legislator stage
// but only skip the offending record in the document linker.

use thiserror::Error;

/// Errors raised by the persistence collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A single field that could not be parsed or validated
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field} {value:?}: {reason}")]
pub struct ParseError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a required field that was null or blank
    pub fn missing(field: &'static str) -> Self {
        ParseError::new(field, "", "required value is missing")
    }
}

/// Errors that end a normalization stage
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("parse failure: {0}")]
    Parse(#[from] ParseError),
}
