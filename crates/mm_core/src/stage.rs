//! Pipeline stages and the per-run state machine.
//!
//! A run moves strictly forward:
//!
//! ```text
//! Idle → Planning → Pricing → Features → Sentiment → Growth → Synthesis → Done
//!            └─────────┴──────────┴───────────┴──────────┴──────────┴──→ Aborted
//! ```
//!
//! No stage is resumable on its own; a new run always starts from `Idle`.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactName;
use crate::error::{CoreError, CoreResult};

/// Stage identifiers in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Plan,
    Pricing,
    Features,
    Sentiment,
    Growth,
    Synthesis,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Plan => "plan",
            StageId::Pricing => "pricing",
            StageId::Features => "features",
            StageId::Sentiment => "sentiment",
            StageId::Growth => "growth",
            StageId::Synthesis => "synthesis",
        }
    }

    /// The fixed execution order.
    pub fn default_order() -> Vec<StageId> {
        vec![
            StageId::Plan,
            StageId::Pricing,
            StageId::Features,
            StageId::Sentiment,
            StageId::Growth,
            StageId::Synthesis,
        ]
    }

    pub fn next(&self) -> Option<StageId> {
        let order = Self::default_order();
        let index = order.iter().position(|s| s == self)?;
        order.get(index + 1).copied()
    }

    /// Artifacts written when this stage completes.
    pub fn artifacts(&self) -> Vec<ArtifactName> {
        match self {
            StageId::Plan => vec![ArtifactName::ResearchPlan],
            StageId::Pricing => vec![ArtifactName::CompetitorPrices],
            StageId::Features => vec![
                ArtifactName::CustomerAnalysis,
                ArtifactName::FeatureScores,
                ArtifactName::FeatureComparison,
            ],
            StageId::Sentiment => vec![
                ArtifactName::SentimentVerified,
                ArtifactName::SentimentMetrics,
                ArtifactName::ReviewSentiment,
            ],
            StageId::Growth => vec![ArtifactName::MarketGrowth],
            StageId::Synthesis => vec![ArtifactName::FinalReport],
        }
    }

    /// The run state while this stage executes.
    pub fn running_state(&self) -> RunState {
        match self {
            StageId::Plan => RunState::Planning,
            StageId::Pricing => RunState::Pricing,
            StageId::Features => RunState::Features,
            StageId::Sentiment => RunState::Sentiment,
            StageId::Growth => RunState::Growth,
            StageId::Synthesis => RunState::Synthesis,
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Planning,
    Pricing,
    Features,
    Sentiment,
    Growth,
    Synthesis,
    Done,
    /// Terminal failure at the given stage.
    Aborted { stage: StageId },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RunState {
    /// The stage executing in this state, if any.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            RunState::Planning => Some(StageId::Plan),
            RunState::Pricing => Some(StageId::Pricing),
            RunState::Features => Some(StageId::Features),
            RunState::Sentiment => Some(StageId::Sentiment),
            RunState::Growth => Some(StageId::Growth),
            RunState::Synthesis => Some(StageId::Synthesis),
            RunState::Idle | RunState::Done | RunState::Aborted { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted { .. })
    }

    /// Move to the next state in the fixed sequence.
    pub fn advance(self) -> CoreResult<RunState> {
        match self {
            RunState::Idle => Ok(RunState::Planning),
            RunState::Done | RunState::Aborted { .. } => Err(self.transition_error("next")),
            running => match running.stage().and_then(|s| s.next()) {
                Some(next) => Ok(next.running_state()),
                None => Ok(RunState::Done),
            },
        }
    }

    /// Abort the stage currently executing.
    pub fn abort(self) -> CoreResult<RunState> {
        match self.stage() {
            Some(stage) => Ok(RunState::Aborted { stage }),
            None => Err(self.transition_error("aborted")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Planning => "planning",
            RunState::Pricing => "pricing",
            RunState::Features => "features",
            RunState::Sentiment => "sentiment",
            RunState::Growth => "growth",
            RunState::Synthesis => "synthesis",
            RunState::Done => "done",
            RunState::Aborted { .. } => "aborted",
        }
    }

    fn transition_error(&self, to: &str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.as_str().to_string(),
            to: to.to_string(),
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Aborted { stage } => write!(f, "aborted at {}", stage),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
