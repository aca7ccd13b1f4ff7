//! Status command - Report on the output directory without changing it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use mm_core::{ArtifactFormat, ArtifactName};
use mm_pipeline::{RunLog, StageStatus};
use mm_schema::{
    CompetitorPrices, FeatureScores, MarketGrowth, SchemaValidator, SentimentMetrics, SentimentReport,
    StagePayload,
};
use mm_store::ArtifactStore;

#[derive(Args)]
pub struct StatusArgs {
    /// Directory to inspect
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Condition of one artifact file.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub file: &'static str,
    pub present: bool,
    pub valid: bool,
    pub problems: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    output_dir: PathBuf,
    artifacts: Vec<ArtifactStatus>,
    sentiment: SentimentMetrics,
    latest_run: Option<RunLog>,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let settings = super::load_settings(&current_dir, args.output_dir.as_ref())?;

    // `at` does not create the directory
    let store = ArtifactStore::at(&settings.output_dir);
    let latest_run = match RunLog::latest(&settings.runs_dir()) {
        Ok(log) => log,
        Err(e) => {
            warn!("Ignoring unreadable run log: {}", e);
            None
        }
    };

    let report = StatusReport {
        output_dir: settings.output_dir.clone(),
        artifacts: inspect(&store),
        sentiment: store.load_sentiment(),
        latest_run,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Check every known artifact in pipeline order.
pub fn inspect(store: &ArtifactStore) -> Vec<ArtifactStatus> {
    ArtifactName::all().into_iter().map(|name| check(store, name)).collect()
}

fn check(store: &ArtifactStore, name: ArtifactName) -> ArtifactStatus {
    let mut status = ArtifactStatus {
        file: name.file_name(),
        present: store.exists(name),
        valid: false,
        problems: Vec::new(),
    };
    if !status.present {
        return status;
    }

    let text = match store.read_text(name) {
        Ok(text) => text,
        Err(e) => {
            status.problems.push(e.to_string());
            return status;
        }
    };

    match name.format() {
        ArtifactFormat::Markdown => {
            if text.trim().is_empty() {
                status.problems.push("file is empty".to_string());
            }
        }
        ArtifactFormat::Json => match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                if let Some(schema) = schema_for(name) {
                    let result = SchemaValidator::validate(&value, &schema);
                    status.problems.extend(result.errors.iter().map(|e| e.to_string()));
                }
            }
            Err(e) => status.problems.push(format!("not valid JSON: {}", e)),
        },
    }

    status.valid = status.problems.is_empty();
    status
}

fn schema_for(name: ArtifactName) -> Option<Value> {
    match name {
        ArtifactName::CompetitorPrices => Some(CompetitorPrices::json_schema()),
        ArtifactName::FeatureScores => Some(FeatureScores::json_schema()),
        ArtifactName::SentimentVerified => Some(SentimentReport::json_schema()),
        ArtifactName::SentimentMetrics => Some(SentimentMetrics::json_schema()),
        ArtifactName::MarketGrowth => Some(MarketGrowth::json_schema()),
        _ => None,
    }
}

fn print_report(report: &StatusReport) {
    println!("📂 Output directory: {}", report.output_dir.display());
    if !report.output_dir.is_dir() {
        println!("   ⚠️  Directory does not exist yet");
    }
    println!();

    println!("📄 Artifacts:");
    for artifact in &report.artifacts {
        if !artifact.present {
            println!("   ➖ {} (missing)", artifact.file);
        } else if artifact.valid {
            println!("   ✅ {}", artifact.file);
        } else {
            println!("   ❌ {}", artifact.file);
            for problem in &artifact.problems {
                println!("      - {}", problem);
            }
        }
    }
    println!();

    let s = &report.sentiment;
    println!(
        "💬 Sentiment: {}% positive, {}% negative, {}% neutral",
        s.positive, s.negative, s.neutral
    );
    println!();

    match &report.latest_run {
        None => println!("🕑 No runs recorded"),
        Some(log) => {
            println!("🕑 Latest run {} for {}: {}", log.run_id, log.product, log.state);
            println!("   Started: {}", log.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
            for record in &log.stages {
                let marker = match record.status {
                    StageStatus::Completed => "✅",
                    StageStatus::Aborted => "❌",
                    StageStatus::Running => "⏳",
                    StageStatus::Pending => "➖",
                };
                println!("   {} {} (attempts: {})", marker, record.stage, record.attempts);
            }
            if let Some(error) = &log.error {
                println!("   Error: {}", error);
            }
        }
    }
}
