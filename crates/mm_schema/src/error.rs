//! Error types for response decoding.

use thiserror::Error;

use crate::validator::ValidationResult;

/// Result type alias for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// A single schema-validation failure for one model response.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("Response could not be parsed: {0}")]
    Parse(String),

    #[error("Schema validation failed: {}", .0.summary())]
    Invalid(ValidationResult),
}

impl DecodeError {
    /// One line per problem, suitable for a repair prompt.
    pub fn messages(&self) -> Vec<String> {
        match self {
            DecodeError::Parse(msg) => vec![msg.clone()],
            DecodeError::Invalid(result) => result.errors.iter().map(|e| e.to_string()).collect(),
        }
    }
}
