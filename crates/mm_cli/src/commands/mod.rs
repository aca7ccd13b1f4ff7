//! CLI command definitions.
//!
//! `run` drives the research pipeline end to end. `status` reports what a
//! previous run left in the output directory without touching it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use mm_core::Settings;

pub mod run;
pub mod status;

/// MarketMind - multi-agent market research pipeline
#[derive(Parser)]
#[command(name = "marketmind")]
#[command(version, about = "MarketMind - multi-agent market research pipeline")]
#[command(long_about = r#"
MarketMind runs a fixed sequence of LLM research stages for a product and
writes the results as JSON and Markdown artifacts for a dashboard to read.

COMMANDS:
  run     → Run every stage: plan, pricing, features, sentiment, growth, synthesis
  status  → Show which artifacts exist, whether they parse, and the latest run

CONFIGURATION:
  OPENAI_API_KEY or ANTHROPIC_API_KEY must be set (a .env file is read).
  SERPER_API_KEY enables web search evidence for pricing and sentiment.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or missing configuration
  3 - Stage aborted after exhausting repairs
  4 - External call failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full research pipeline for a product
    Run(run::RunArgs),

    /// Show the state of the output directory
    Status(status::StatusArgs),
}

/// Settings for the current directory with an optional output override.
pub fn load_settings(workspace_root: &Path, output_dir: Option<&PathBuf>) -> Result<Settings> {
    let mut settings = Settings::load(workspace_root)?;
    if let Some(dir) = output_dir {
        settings = settings.with_output_dir(dir);
    }
    Ok(settings)
}
