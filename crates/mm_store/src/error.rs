//! Error types for artifact storage.

use std::path::PathBuf;

use thiserror::Error;

/// Artifact storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Artifact {name} is not valid JSON: {message}")]
    Malformed { name: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
