//! Error types for record validation and decoding

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required field: unique_id")]
    MissingId,

    #[error("malformed unique_id {0:?}: expected 36 characters of [a-z0-9-]")]
    InvalidId(String),

    #[error("field {field} contains a delimiter or line break")]
    IllegalCharacter { field: &'static str },

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unique_id in body ({body}) does not match path ({path})")]
    IdMismatch { path: String, body: String },
}

pub type Result<T> = std::result::Result<T, RecordError>;
