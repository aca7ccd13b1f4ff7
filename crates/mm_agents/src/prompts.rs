//! Prompt assembly.

use tracing::debug;

use mm_core::RunContext;
use mm_llm::{ChatMessage, CompletionRequest, SearchHit};

use crate::tasks::TaskKind;

/// Maximum characters of a search snippet quoted in a prompt.
const SNIPPET_CHAR_LIMIT: usize = 400;

/// Builds completion requests for tasks.
pub struct PromptBuilder<'a> {
    ctx: &'a RunContext,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// First attempt at a task.
    pub fn request(&self, task: TaskKind, evidence: &[SearchHit]) -> CompletionRequest {
        CompletionRequest::new(task.role().system_prompt(), self.user_prompt(task, evidence))
            .json(task.expects_json())
            .tagged(format!("{}/{}", task.stage(), task))
    }

    /// Re-prompt after a response failed validation.
    ///
    /// The failed response is replayed as the assistant turn so the model can
    /// correct it rather than start over.
    pub fn repair_request(
        &self,
        task: TaskKind,
        evidence: &[SearchHit],
        previous: &str,
        errors: &[String],
    ) -> CompletionRequest {
        debug!("Building repair prompt for {} with {} error(s)", task, errors.len());
        let listed = errors.iter().map(|e| format!("- {}", e)).collect::<Vec<_>>().join("\n");
        let correction = format!(
            "Your previous response failed validation:\n{}\n\n\
             Return a corrected response that fixes every problem listed. {}",
            listed,
            task.output_contract()
        );

        self.request(task, evidence)
            .push(ChatMessage::assistant(previous))
            .push(ChatMessage::user(correction))
    }

    fn user_prompt(&self, task: TaskKind, evidence: &[SearchHit]) -> String {
        let ctx = self.ctx;
        let mut sections = vec![
            format!(
                "## Product\n\n- Name: {}\n- Industry: {}\n- Geography: {}\n- Business scale: {}\n- Competitors: {}\n- Features: {}",
                ctx.config.name,
                ctx.config.industry,
                ctx.config.geography,
                ctx.config.scale,
                ctx.inputs.competitors.join(", "),
                ctx.inputs.features.join(", ")
            ),
            format!("## Task\n\n{}", task.instructions(ctx)),
        ];

        let prior = ctx.render_prior(&task.context_stages());
        if !prior.is_empty() {
            sections.push(format!("## Prior research\n\n{}", prior));
        }

        if task.evidence_query(ctx).is_some() {
            sections.push(render_evidence(evidence));
        }

        sections.push(format!("## Output format\n\n{}", task.output_contract()));
        sections.join("\n\n")
    }
}

fn render_evidence(evidence: &[SearchHit]) -> String {
    if evidence.is_empty() {
        return "## Evidence\n\nNo search results are available. Rely on general knowledge, \
                leave `sources` empty and mark figures you cannot verify."
            .to_string();
    }

    let hits = evidence
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let snippet: String = hit.snippet.chars().take(SNIPPET_CHAR_LIMIT).collect();
            format!("{}. {}\n   URL: {}\n   {}", i + 1, hit.title, hit.url, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("## Evidence\n\n{}", hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_core::{ArtifactName, ComparisonInputs, ProductConfig, StageId, StageOutput, TaskOutput};
    use mm_llm::MessageRole;

    fn ctx() -> RunContext {
        RunContext::new(
            ProductConfig::new("Acme Widget", "Hardware"),
            ComparisonInputs::from_text("BetaCo, GammaInc", "Durability, Price"),
        )
    }

    fn hit() -> SearchHit {
        SearchHit {
            title: "Acme Widget review".to_string(),
            snippet: "Sturdy but pricey.".to_string(),
            url: "https://reviews.example/acme".to_string(),
        }
    }

    #[test]
    fn test_request_carries_role_and_mode() {
        let ctx = ctx();
        let request = PromptBuilder::new(&ctx).request(TaskKind::CompetitorPricing, &[hit()]);

        assert!(request.system.contains("Competitor Analyst"));
        assert!(request.expect_json);
        assert_eq!(request.tag, "pricing/competitor_pricing");
        assert!(request.last_prompt().contains("https://reviews.example/acme"));
    }

    #[test]
    fn test_prior_context_included() {
        let mut ctx = ctx();
        ctx.record(StageOutput::new(StageId::Plan).with_artifact(
            ArtifactName::ResearchPlan,
            TaskOutput::Markdown("# Plan\n\nInterview hardware buyers.".to_string()),
        ));

        let request = PromptBuilder::new(&ctx).request(TaskKind::GrowthProjection, &[]);
        let prompt = request.last_prompt();
        assert!(prompt.contains("Interview hardware buyers."));
        assert!(!prompt.contains("## Evidence"));
    }

    #[test]
    fn test_missing_evidence_is_stated() {
        let ctx = ctx();
        let request = PromptBuilder::new(&ctx).request(TaskKind::ReviewSentiment, &[]);
        assert!(request.last_prompt().contains("No search results are available"));
    }

    #[test]
    fn test_repair_request_lists_errors() {
        let ctx = ctx();
        let errors = vec!["/competitors: Missing requested competitor 'GammaInc'".to_string()];
        let request =
            PromptBuilder::new(&ctx).repair_request(TaskKind::CompetitorPricing, &[], "{\"product\": {}}", &errors);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[1].role, MessageRole::Assistant);
        assert!(request.last_prompt().contains("- /competitors: Missing requested competitor 'GammaInc'"));
    }
}
