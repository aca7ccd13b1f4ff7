//! Error types for external calls.

use thiserror::Error;

/// LLM and search errors.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Network error: {0}")]
    Request(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No response from {0}")]
    EmptyResponse(String),
}

impl LlmError {
    /// Whether a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
