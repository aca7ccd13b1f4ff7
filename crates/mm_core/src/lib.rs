//! # mm_core
//!
//! Core data model for MarketMind.
//!
//! This crate holds the types every other crate agrees on: the product
//! configuration a user submits, the comparison inputs, the fixed stage
//! sequence with its run state machine, the artifact names the dashboard
//! expects, and the accumulating run context threaded through the pipeline.
//!
//! # Architecture
//!
//! - **Config**: `ProductConfig` and `ComparisonInputs`, created once per run
//! - **Stages**: `StageId` in fixed order and the `RunState` machine
//! - **Artifacts**: `ArtifactName` with bit-exact file names
//! - **Context**: `RunContext`, the explicit carrier of prior-stage outputs
//! - **Settings**: layered configuration (defaults, settings file, env)

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod settings;
pub mod stage;

pub use artifact::{ArtifactFormat, ArtifactName};
pub use config::{parse_list, ComparisonInputs, ProductConfig};
pub use context::{RunContext, StageOutput, TaskOutput};
pub use error::{CoreError, CoreResult};
pub use settings::{LlmProviderKind, Settings};
pub use stage::{RunState, StageId};
