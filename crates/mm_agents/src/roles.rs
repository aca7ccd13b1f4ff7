//! Analyst personas.

use serde::{Deserialize, Serialize};

use crate::tasks::TaskKind;

/// Market research roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    StrategyConsultant,
    CompetitiveAnalyst,
    PersonaAnalyst,
    SentimentAnalyst,
    Synthesizer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::StrategyConsultant => "strategy_consultant",
            AgentRole::CompetitiveAnalyst => "competitive_analyst",
            AgentRole::PersonaAnalyst => "persona_analyst",
            AgentRole::SentimentAnalyst => "sentiment_analyst",
            AgentRole::Synthesizer => "synthesizer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::StrategyConsultant => "Market Strategy Consultant",
            AgentRole::CompetitiveAnalyst => "Competitor Analyst",
            AgentRole::PersonaAnalyst => "Customer Persona Analyst",
            AgentRole::SentimentAnalyst => "Review & Sentiment Analyst",
            AgentRole::Synthesizer => "Lead Strategy Synthesizer",
        }
    }

    pub fn goal(&self) -> &'static str {
        match self {
            AgentRole::StrategyConsultant => {
                "Design a structured research plan for understanding the market, customers, and competition."
            }
            AgentRole::CompetitiveAnalyst => {
                "Identify and benchmark the named competitors for the given product, including pricing, positioning, and key strengths and weaknesses."
            }
            AgentRole::PersonaAnalyst => {
                "Develop detailed customer personas describing who buys the product, why, and how they make decisions, and score how each product delivers the features buyers care about."
            }
            AgentRole::SentimentAnalyst => {
                "Summarize customer sentiment and identify recurring themes from the reviews available."
            }
            AgentRole::Synthesizer => {
                "Integrate all research outputs into a clear, structured market strategy report for executives and product leaders."
            }
        }
    }

    pub fn backstory(&self) -> &'static str {
        match self {
            AgentRole::StrategyConsultant => {
                "You are a senior market strategist who has worked with global brands to structure research initiatives, define key questions, and align objectives."
            }
            AgentRole::CompetitiveAnalyst => {
                "You specialize in competitive intelligence and benchmarking across consumer and enterprise markets. You always focus on real products and brands."
            }
            AgentRole::PersonaAnalyst => {
                "You are a behavioral marketing expert who transforms raw data into vivid personas with goals, pain points, and buying motivations."
            }
            AgentRole::SentimentAnalyst => {
                "You specialize in text analysis, extracting sentiment trends and key pain points from customer feedback, app store reviews, and social media."
            }
            AgentRole::Synthesizer => {
                "You are a seasoned strategy leader who can read long research artifacts and synthesize them into concise, compelling narratives with actionable recommendations."
            }
        }
    }

    /// System prompt sent with every task answered by this role.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {} on a market research team.\n\n{}\n\nYour goal: {}\n\n{}",
            self.display_name(),
            self.backstory(),
            self.goal(),
            SHARED_RULES
        )
    }

    /// Tasks this role answers, in pipeline order.
    pub fn tasks(&self) -> Vec<TaskKind> {
        TaskKind::all().into_iter().filter(|t| t.role() == *self).collect()
    }

    pub fn all() -> Vec<Self> {
        vec![
            AgentRole::StrategyConsultant,
            AgentRole::CompetitiveAnalyst,
            AgentRole::PersonaAnalyst,
            AgentRole::SentimentAnalyst,
            AgentRole::Synthesizer,
        ]
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const SHARED_RULES: &str = r#"Rules:
- Only discuss the product and the competitors the user named. Never invent additional brands.
- Use the exact product, competitor and feature names you are given.
- When evidence is provided, prefer it over prior knowledge and never cite a URL that is not in the evidence.
- When a figure cannot be verified, say so instead of guessing precisely.
- Follow the requested output format exactly."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_tasks() {
        for role in AgentRole::all() {
            assert!(!role.tasks().is_empty(), "{} has no tasks", role);
        }
        assert_eq!(
            AgentRole::StrategyConsultant.tasks(),
            vec![TaskKind::ResearchPlan, TaskKind::GrowthProjection]
        );
    }

    #[test]
    fn test_system_prompt() {
        let prompt = AgentRole::SentimentAnalyst.system_prompt();
        assert!(prompt.starts_with("You are the Review & Sentiment Analyst"));
        assert!(prompt.contains("never cite a URL"));
    }
}
