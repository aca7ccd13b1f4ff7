//! Deterministic artifacts derived from validated JSON.
//!
//! `feature_comparison.md`, `review_sentiment.md` and `sentiment_metrics.json`
//! are rendered here rather than requested from the model, so the figures in
//! the reports always match the JSON the charts read.

use mm_core::{ArtifactName, RunContext, StageId, StageOutput, TaskOutput};
use mm_schema::{FeatureScores, SentimentMetrics, SentimentReport};

use crate::error::{PipelineError, PipelineResult};

/// Artifacts derived from a stage's task outputs.
pub fn derive(stage: StageId, output: &StageOutput, ctx: &RunContext) -> PipelineResult<Vec<(ArtifactName, TaskOutput)>> {
    match stage {
        StageId::Features => {
            let scores: FeatureScores = payload(output, ArtifactName::FeatureScores)?;
            Ok(vec![(
                ArtifactName::FeatureComparison,
                TaskOutput::Markdown(feature_comparison(ctx, &scores)),
            )])
        }
        StageId::Sentiment => {
            let report: SentimentReport = payload(output, ArtifactName::SentimentVerified)?;
            let metrics = serde_json::to_value(SentimentMetrics::from(&report)).map_err(|e| PipelineError::Render {
                stage,
                message: e.to_string(),
            })?;
            Ok(vec![
                (ArtifactName::SentimentMetrics, TaskOutput::Json(metrics)),
                (ArtifactName::ReviewSentiment, TaskOutput::Markdown(review_sentiment(&report))),
            ])
        }
        _ => Ok(Vec::new()),
    }
}

fn payload<T: serde::de::DeserializeOwned>(output: &StageOutput, name: ArtifactName) -> PipelineResult<T> {
    let message = match output.artifacts.get(&name) {
        Some(TaskOutput::Json(value)) => match serde_json::from_value(value.clone()) {
            Ok(payload) => return Ok(payload),
            Err(e) => format!("{}: {}", name, e),
        },
        _ => format!("{} missing from stage output", name),
    };
    Err(PipelineError::Render {
        stage: output.stage,
        message,
    })
}

/// Markdown table of scores, one row per feature and one column per product.
pub fn feature_comparison(ctx: &RunContext, scores: &FeatureScores) -> String {
    let products = ctx.inputs.products(&ctx.config);
    let mut out = format!("# Feature Comparison: {}\n\n", ctx.config.name);
    out.push_str(&format!("**Industry:** {}\n\n", ctx.config.industry));
    out.push_str("## Scores (0-10)\n\n");

    out.push_str(&format!("| Feature | {} |\n", products.join(" | ")));
    out.push_str(&format!("|---|{}\n", "---|".repeat(products.len())));
    for feature in &ctx.inputs.features {
        let cells: Vec<String> = products
            .iter()
            .map(|p| scores.score(p, feature).map(format_score).unwrap_or_else(|| "-".to_string()))
            .collect();
        out.push_str(&format!("| {} | {} |\n", feature, cells.join(" | ")));
    }

    out.push_str("\n## Average Score\n\n");
    for product in &products {
        let values: Vec<f64> = ctx.inputs.features.iter().filter_map(|f| scores.score(product, f)).collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        out.push_str(&format!("- **{}**: {:.1}\n", product, mean));
    }
    out
}

/// Markdown sentiment report quoting the verified percentages.
pub fn review_sentiment(report: &SentimentReport) -> String {
    let s = &report.sentiment;
    let mut out = format!("# Review & Sentiment Analysis: {}\n\n", report.product);

    out.push_str("## Sentiment Breakdown\n\n");
    out.push_str(&format!("- Positive: {}%\n", s.positive));
    out.push_str(&format!("- Negative: {}%\n", s.negative));
    out.push_str(&format!("- Neutral: {}%\n\n", s.neutral));

    out.push_str(&format!("## Summary\n\n{}\n\n", report.summary.trim()));
    out.push_str(&bullets("Common Praises", &report.praises));
    out.push_str(&bullets("Common Complaints", &report.complaints));

    out.push_str("## Sources\n\n");
    if report.no_verified_sources {
        out.push_str("_No verified sources. Figures are model estimates._\n");
    } else {
        for source in &report.sources {
            let title = source.title.as_deref().unwrap_or(&source.url);
            out.push_str(&format!("- [{}]({})\n", title, source.url));
        }
    }
    out
}

fn bullets(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        return format!("## {}\n\n_None reported._\n\n", heading);
    }
    let lines: String = items.iter().map(|i| format!("- {}\n", i)).collect();
    format!("## {}\n\n{}\n", heading, lines)
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.0}", score)
    } else {
        format!("{:.1}", score)
    }
}
