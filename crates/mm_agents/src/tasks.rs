//! Prompt task definitions.
//!
//! Each task is one LLM call. It declares its stage, the role that answers it,
//! the artifact it produces and the decoder that turns the raw response into a
//! validated [`TaskOutput`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mm_core::{ArtifactFormat, ArtifactName, RunContext, StageId, TaskOutput};
use mm_schema::{
    decode, decode_markdown, CompetitorPrices, DecodeError, Expectations, FeatureScores, MarkdownSchema,
    MarketGrowth, SentimentReport, StagePayload,
};

use crate::roles::AgentRole;

/// Sections the final report must contain.
pub const SYNTHESIS_SECTIONS: [&str; 7] = [
    "Executive Summary",
    "Market Overview",
    "Competitor Insights",
    "Customer Insights",
    "Sentiment Analysis",
    "Feature Comparison Summary",
    "Strategic Recommendations",
];

/// A validated task result plus non-fatal findings.
#[derive(Debug, Clone)]
pub struct DecodedOutput {
    pub output: TaskOutput,
    pub warnings: Vec<String>,
}

/// Every LLM task in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ResearchPlan,
    CompetitorPricing,
    CustomerPersonas,
    FeatureScores,
    ReviewSentiment,
    GrowthProjection,
    StrategySynthesis,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ResearchPlan => "research_plan",
            TaskKind::CompetitorPricing => "competitor_pricing",
            TaskKind::CustomerPersonas => "customer_personas",
            TaskKind::FeatureScores => "feature_scores",
            TaskKind::ReviewSentiment => "review_sentiment",
            TaskKind::GrowthProjection => "growth_projection",
            TaskKind::StrategySynthesis => "strategy_synthesis",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            TaskKind::ResearchPlan,
            TaskKind::CompetitorPricing,
            TaskKind::CustomerPersonas,
            TaskKind::FeatureScores,
            TaskKind::ReviewSentiment,
            TaskKind::GrowthProjection,
            TaskKind::StrategySynthesis,
        ]
    }

    /// Tasks of one stage, in execution order.
    pub fn for_stage(stage: StageId) -> Vec<Self> {
        Self::all().into_iter().filter(|t| t.stage() == stage).collect()
    }

    pub fn stage(&self) -> StageId {
        match self {
            TaskKind::ResearchPlan => StageId::Plan,
            TaskKind::CompetitorPricing => StageId::Pricing,
            TaskKind::CustomerPersonas | TaskKind::FeatureScores => StageId::Features,
            TaskKind::ReviewSentiment => StageId::Sentiment,
            TaskKind::GrowthProjection => StageId::Growth,
            TaskKind::StrategySynthesis => StageId::Synthesis,
        }
    }

    pub fn role(&self) -> AgentRole {
        match self {
            TaskKind::ResearchPlan | TaskKind::GrowthProjection => AgentRole::StrategyConsultant,
            TaskKind::CompetitorPricing => AgentRole::CompetitiveAnalyst,
            TaskKind::CustomerPersonas | TaskKind::FeatureScores => AgentRole::PersonaAnalyst,
            TaskKind::ReviewSentiment => AgentRole::SentimentAnalyst,
            TaskKind::StrategySynthesis => AgentRole::Synthesizer,
        }
    }

    /// The artifact holding this task's validated response.
    pub fn artifact(&self) -> ArtifactName {
        match self {
            TaskKind::ResearchPlan => ArtifactName::ResearchPlan,
            TaskKind::CompetitorPricing => ArtifactName::CompetitorPrices,
            TaskKind::CustomerPersonas => ArtifactName::CustomerAnalysis,
            TaskKind::FeatureScores => ArtifactName::FeatureScores,
            TaskKind::ReviewSentiment => ArtifactName::SentimentVerified,
            TaskKind::GrowthProjection => ArtifactName::MarketGrowth,
            TaskKind::StrategySynthesis => ArtifactName::FinalReport,
        }
    }

    pub fn format(&self) -> ArtifactFormat {
        self.artifact().format()
    }

    pub fn expects_json(&self) -> bool {
        self.format() == ArtifactFormat::Json
    }

    /// Completed stages quoted as context in this task's prompt.
    pub fn context_stages(&self) -> Vec<StageId> {
        match self {
            TaskKind::ResearchPlan => Vec::new(),
            TaskKind::CompetitorPricing | TaskKind::CustomerPersonas | TaskKind::ReviewSentiment => {
                vec![StageId::Plan]
            }
            TaskKind::FeatureScores | TaskKind::GrowthProjection => vec![StageId::Plan, StageId::Pricing],
            TaskKind::StrategySynthesis => vec![
                StageId::Plan,
                StageId::Pricing,
                StageId::Features,
                StageId::Sentiment,
                StageId::Growth,
            ],
        }
    }

    /// Web search run before this task, if it uses evidence.
    pub fn evidence_query(&self, ctx: &RunContext) -> Option<String> {
        let product = &ctx.config.name;
        match self {
            TaskKind::CompetitorPricing => Some(format!(
                "{} {} price {}",
                product,
                ctx.inputs.competitors.join(" "),
                ctx.config.geography
            )),
            TaskKind::ReviewSentiment => Some(format!("{} {} reviews", product, ctx.config.industry)),
            _ => None,
        }
    }

    /// What the model is asked to do.
    pub fn instructions(&self, ctx: &RunContext) -> String {
        let product = &ctx.config.name;
        let industry = &ctx.config.industry;
        let competitors = ctx.inputs.competitors.join(", ");
        let features = ctx.inputs.features.join(", ");

        match self {
            TaskKind::ResearchPlan => format!(
                "Develop a structured research plan for **{product}** in the **{industry}** industry. \
                 Identify data sources, key market questions, and methods for gathering insights. \
                 Cover objectives, target audiences, the competitors {competitors}, \
                 and approaches for market data collection."
            ),
            TaskKind::CompetitorPricing => format!(
                "Estimate the current retail price of **{product}** and of each competitor: {competitors}. \
                 Use one entry per competitor with exactly the names given. \
                 Set `price` to null when no reliable figure exists, and put the evidence URL \
                 you relied on in `source`."
            ),
            TaskKind::CustomerPersonas => format!(
                "Develop 3-4 detailed customer personas for **{product}** in the **{industry}** market. \
                 Include demographics, psychographics, goals, pain points, and buying motivations, \
                 and explain how each persona weighs these features: {features}."
            ),
            TaskKind::FeatureScores => {
                let pairs = ctx
                    .inputs
                    .products(&ctx.config)
                    .into_iter()
                    .flat_map(|p| ctx.inputs.features.iter().map(move |f| format!("- ({}, {})", p, f)))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Score how well each product delivers each feature on a scale from 0 (absent) \
                     to 10 (best in class). Return exactly one score for each of these \
                     (product, feature) pairs and nothing else:\n{pairs}"
                )
            }
            TaskKind::ReviewSentiment => format!(
                "Summarize customer reviews and perform sentiment analysis for **{product}**. \
                 Provide whole-number percentages of positive, negative and neutral sentiment \
                 that add up to 100, the most common praises, the most common complaints, \
                 and a short narrative summary. List in `sources` only evidence URLs you used; \
                 set `no_verified_sources` to true if you used none."
            ),
            TaskKind::GrowthProjection => format!(
                "Project the annual market growth rate (percent) of the **{industry}** segment \
                 that **{product}** competes in, in {geo}, for the next five years. \
                 Use calendar years in increasing order with one growth value per year, \
                 and explain the drivers in `rationale`.",
                geo = ctx.config.geography
            ),
            TaskKind::StrategySynthesis => format!(
                "Synthesize insights from all prior analyses into a comprehensive market strategy \
                 report for **{product}** in the **{industry}** industry, aimed at a {scale} business. \
                 Quote sentiment percentages and prices exactly as they appear in the context.",
                scale = ctx.config.scale
            ),
        }
    }

    /// The required output format, appended to the prompt.
    pub fn output_contract(&self) -> String {
        match self.json_schema() {
            Some(schema) => format!(
                "Respond with a single JSON object matching this JSON Schema:\n```json\n{}\n```",
                serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
            ),
            None if *self == TaskKind::StrategySynthesis => format!(
                "Respond in Markdown titled '# Final Market Strategy Report' with these sections \
                 as headings, in order: {}.",
                SYNTHESIS_SECTIONS.join(", ")
            ),
            None => "Respond in well-structured Markdown with headings.".to_string(),
        }
    }

    fn json_schema(&self) -> Option<Value> {
        match self {
            TaskKind::CompetitorPricing => Some(CompetitorPrices::json_schema()),
            TaskKind::FeatureScores => Some(FeatureScores::json_schema()),
            TaskKind::ReviewSentiment => Some(SentimentReport::json_schema()),
            TaskKind::GrowthProjection => Some(MarketGrowth::json_schema()),
            _ => None,
        }
    }

    pub fn markdown_schema(&self) -> MarkdownSchema {
        match self {
            TaskKind::StrategySynthesis => MarkdownSchema::plain().with_sections(SYNTHESIS_SECTIONS),
            _ => MarkdownSchema::plain(),
        }
    }

    /// Decode a raw model response into a validated output.
    pub fn decode(&self, raw: &str, expect: &Expectations) -> Result<DecodedOutput, DecodeError> {
        match self {
            TaskKind::CompetitorPricing => decode_json::<CompetitorPrices>(raw, expect),
            TaskKind::FeatureScores => decode_json::<FeatureScores>(raw, expect),
            TaskKind::ReviewSentiment => decode_json::<SentimentReport>(raw, expect),
            TaskKind::GrowthProjection => decode_json::<MarketGrowth>(raw, expect),
            TaskKind::ResearchPlan | TaskKind::CustomerPersonas | TaskKind::StrategySynthesis => {
                let text = decode_markdown(raw, &self.markdown_schema())?;
                Ok(DecodedOutput {
                    output: TaskOutput::Markdown(text),
                    warnings: Vec::new(),
                })
            }
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn decode_json<T: StagePayload>(raw: &str, expect: &Expectations) -> Result<DecodedOutput, DecodeError> {
    let decoded = decode::<T>(raw, expect)?;
    let value = serde_json::to_value(&decoded.payload).map_err(|e| DecodeError::Parse(e.to_string()))?;
    Ok(DecodedOutput {
        output: TaskOutput::Json(value),
        warnings: decoded.warnings,
    })
}
