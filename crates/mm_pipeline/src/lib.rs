//! # mm_pipeline
//!
//! The MarketMind orchestrator.
//!
//! [`Orchestrator::run_analysis`] drives a run through the fixed stage
//! sequence:
//!
//! ```text
//! plan → pricing → features → sentiment → growth → synthesis
//! ```
//!
//! Each stage's prompts quote the validated outputs of earlier stages from an
//! explicit [`mm_core::RunContext`]. Responses are decoded strictly; a schema
//! failure is re-prompted with the problems listed, up to the
//! [`RetryPolicy`] budget, after which the run aborts at that stage. The
//! progress of every run is persisted as a [`RunLog`].

pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod render;
pub mod run_log;

pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use policy::RetryPolicy;
pub use run_log::{RunLog, StageRecord, StageStatus};
