//! # mm_agents
//!
//! Analyst personas and the prompt tasks bound to them.
//!
//! A role is a system-prompt template, not a stateful actor. A task knows
//! which stage it belongs to, which role answers it, which artifact it
//! produces and how its response is decoded.
//!
//! | Role | Tasks |
//! |------|-------|
//! | [`AgentRole::StrategyConsultant`] | research plan, growth projection |
//! | [`AgentRole::CompetitiveAnalyst`] | competitor pricing |
//! | [`AgentRole::PersonaAnalyst`] | customer personas, feature scores |
//! | [`AgentRole::SentimentAnalyst`] | review sentiment |
//! | [`AgentRole::Synthesizer`] | final strategy report |

pub mod prompts;
pub mod roles;
pub mod tasks;

pub use prompts::PromptBuilder;
pub use roles::AgentRole;
pub use tasks::{DecodedOutput, TaskKind, SYNTHESIS_SECTIONS};
