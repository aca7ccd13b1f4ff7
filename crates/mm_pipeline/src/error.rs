//! Error types for pipeline runs.

use thiserror::Error;

use mm_core::{CoreError, StageId};
use mm_llm::LlmError;
use mm_store::StoreError;

/// Pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required credential or setting is absent. Raised before the run starts.
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every attempt at a task failed schema validation.
    #[error("Stage '{stage}' aborted: task {task} failed validation after {attempts} attempt(s): {}", .errors.join("; "))]
    StageAborted {
        stage: StageId,
        task: String,
        attempts: u32,
        errors: Vec<String>,
    },

    /// The LLM call itself failed.
    #[error("Stage '{stage}' failed calling the LLM: {source}")]
    ExternalCallFailure {
        stage: StageId,
        #[source]
        source: LlmError,
    },

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    /// A validated stage's artifacts could not be written.
    #[error("Stage '{stage}' failed writing artifacts: {source}")]
    ArtifactWrite {
        stage: StageId,
        #[source]
        source: StoreError,
    },

    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    #[error("Stage '{stage}' failed to render derived artifact: {message}")]
    Render { stage: StageId, message: String },

    #[error("Run log error: {0}")]
    RunLog(String),

    #[error(transparent)]
    Core(CoreError),
}

impl PipelineError {
    /// The stage that failed, if the error belongs to one.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            PipelineError::StageAborted { stage, .. }
            | PipelineError::ExternalCallFailure { stage, .. }
            | PipelineError::ArtifactWrite { stage, .. }
            | PipelineError::Render { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => PipelineError::InvalidInput(msg),
            other => PipelineError::Core(other),
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => PipelineError::ConfigMissing(err.to_string()),
            other => PipelineError::ClientSetup(other.to_string()),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
