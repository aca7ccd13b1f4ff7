//! Artifact names shared with the dashboard.
//!
//! The file names are an external contract and must not change.

use serde::{Deserialize, Serialize};

/// On-disk format of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Json,
    Markdown,
}

/// Every artifact the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactName {
    #[serde(rename = "research_plan.md")]
    ResearchPlan,
    #[serde(rename = "competitor_prices.json")]
    CompetitorPrices,
    #[serde(rename = "customer_analysis.md")]
    CustomerAnalysis,
    #[serde(rename = "feature_scores.json")]
    FeatureScores,
    #[serde(rename = "feature_comparison.md")]
    FeatureComparison,
    #[serde(rename = "sentiment_verified.json")]
    SentimentVerified,
    #[serde(rename = "sentiment_metrics.json")]
    SentimentMetrics,
    #[serde(rename = "review_sentiment.md")]
    ReviewSentiment,
    #[serde(rename = "market_growth.json")]
    MarketGrowth,
    #[serde(rename = "final_market_strategy_report.md")]
    FinalReport,
}

impl ArtifactName {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::ResearchPlan => "research_plan.md",
            Self::CompetitorPrices => "competitor_prices.json",
            Self::CustomerAnalysis => "customer_analysis.md",
            Self::FeatureScores => "feature_scores.json",
            Self::FeatureComparison => "feature_comparison.md",
            Self::SentimentVerified => "sentiment_verified.json",
            Self::SentimentMetrics => "sentiment_metrics.json",
            Self::ReviewSentiment => "review_sentiment.md",
            Self::MarketGrowth => "market_growth.json",
            Self::FinalReport => "final_market_strategy_report.md",
        }
    }

    pub fn format(&self) -> ArtifactFormat {
        if self.file_name().ends_with(".json") {
            ArtifactFormat::Json
        } else {
            ArtifactFormat::Markdown
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|a| a.file_name() == name)
    }

    /// All artifacts in pipeline order.
    pub fn all() -> Vec<Self> {
        vec![
            Self::ResearchPlan,
            Self::CompetitorPrices,
            Self::CustomerAnalysis,
            Self::FeatureScores,
            Self::FeatureComparison,
            Self::SentimentVerified,
            Self::SentimentMetrics,
            Self::ReviewSentiment,
            Self::MarketGrowth,
            Self::FinalReport,
        ]
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}
