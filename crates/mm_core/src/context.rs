//! Run context threaded through the pipeline.
//!
//! Later prompts depend on earlier outputs. Instead of re-reading the output
//! directory, every completed stage records its validated outputs here and the
//! next stage reads them back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactName;
use crate::config::{ComparisonInputs, ProductConfig};
use crate::stage::StageId;

/// Maximum characters of a single prior artifact embedded in a prompt.
const CONTEXT_CHAR_LIMIT: usize = 6_000;

/// A validated task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum TaskOutput {
    Json(serde_json::Value),
    Markdown(String),
}

impl TaskOutput {
    /// Text form used when quoting the output in a prompt.
    pub fn as_prompt_text(&self) -> String {
        match self {
            TaskOutput::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            TaskOutput::Markdown(text) => text.clone(),
        }
    }
}

/// All outputs of one completed stage, keyed by artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: StageId,
    pub artifacts: BTreeMap<ArtifactName, TaskOutput>,
}

impl StageOutput {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn with_artifact(mut self, name: ArtifactName, output: TaskOutput) -> Self {
        self.artifacts.insert(name, output);
        self
    }
}

/// Context for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: ProductConfig,
    pub inputs: ComparisonInputs,
    /// Outputs of completed stages
    pub outputs: BTreeMap<StageId, StageOutput>,
}

impl RunContext {
    pub fn new(config: ProductConfig, inputs: ComparisonInputs) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            inputs,
            outputs: BTreeMap::new(),
        }
    }

    /// Record a completed stage.
    pub fn record(&mut self, output: StageOutput) {
        self.outputs.insert(output.stage, output);
    }

    pub fn stage_output(&self, stage: StageId) -> Option<&StageOutput> {
        self.outputs.get(&stage)
    }

    pub fn artifact(&self, name: ArtifactName) -> Option<&TaskOutput> {
        self.outputs.values().find_map(|o| o.artifacts.get(&name))
    }

    /// Decode a JSON artifact from an earlier stage.
    pub fn artifact_json<T: serde::de::DeserializeOwned>(&self, name: ArtifactName) -> Option<T> {
        match self.artifact(name)? {
            TaskOutput::Json(value) => serde_json::from_value(value.clone()).ok(),
            TaskOutput::Markdown(_) => None,
        }
    }

    /// Render the outputs of the given stages as prompt context.
    ///
    /// Stages that have not completed are skipped.
    pub fn render_prior(&self, stages: &[StageId]) -> String {
        let mut sections = Vec::new();
        for stage in stages {
            let Some(output) = self.outputs.get(stage) else {
                continue;
            };
            for (name, artifact) in &output.artifacts {
                sections.push(format!(
                    "### {}\n\n{}",
                    name,
                    truncate(&artifact.as_prompt_text(), CONTEXT_CHAR_LIMIT)
                ));
            }
        }
        sections.join("\n\n")
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}\n\n[truncated]", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RunContext {
        RunContext::new(
            ProductConfig::new("Acme Widget", "Hardware"),
            ComparisonInputs::from_text("BetaCo", "Durability"),
        )
    }

    #[test]
    fn test_record_and_lookup() {
        let mut ctx = context();
        ctx.record(
            StageOutput::new(StageId::Plan)
                .with_artifact(ArtifactName::ResearchPlan, TaskOutput::Markdown("# Plan".into())),
        );
        ctx.record(StageOutput::new(StageId::Growth).with_artifact(
            ArtifactName::MarketGrowth,
            TaskOutput::Json(json!({"years": [2024], "growth_percent": [3.5]})),
        ));

        assert!(ctx.stage_output(StageId::Plan).is_some());
        assert!(ctx.stage_output(StageId::Pricing).is_none());

        let growth: Option<serde_json::Value> = ctx.artifact_json(ArtifactName::MarketGrowth);
        assert_eq!(growth.unwrap()["years"][0], 2024);
        let plan: Option<serde_json::Value> = ctx.artifact_json(ArtifactName::ResearchPlan);
        assert!(plan.is_none());
    }

    #[test]
    fn test_render_prior_skips_missing_stages() {
        let mut ctx = context();
        ctx.record(
            StageOutput::new(StageId::Plan)
                .with_artifact(ArtifactName::ResearchPlan, TaskOutput::Markdown("Plan body".into())),
        );

        let rendered = ctx.render_prior(&[StageId::Plan, StageId::Pricing]);
        assert!(rendered.contains("### research_plan.md"));
        assert!(rendered.contains("Plan body"));
        assert!(!rendered.contains("competitor_prices.json"));
    }

    #[test]
    fn test_truncate() {
        let long = "x".repeat(20);
        assert_eq!(truncate(&long, 30), long);
        assert!(truncate(&long, 5).ends_with("[truncated]"));
    }
}
